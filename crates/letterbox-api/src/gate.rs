//! Authorization predicates and the chain runner.
//!
//! A request's authorization state is an [`AuthStatus`]: the caller's claim
//! (if any) plus a decision that starts `Pending`. Each [`Predicate`] is a
//! pure transition on that record. [`run`] applies a chain in order and stops
//! at the first denial; a chain that finishes without a denial is `Allowed`.
//!
//! Message-scoped predicates look the message up through [`MessageParties`].
//! A message that does not exist is treated exactly like a message the caller
//! has no relation to, so existence is never revealed.

use tracing::warn;

use letterbox_types::api::Claims;

use crate::store::MessageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// A verified claim is present.
    LoggedIn,
    /// The claim's username matches the `{username}` path parameter.
    CorrectUser,
    /// The caller sent or received the `{id}` message.
    Correspondent,
    /// The caller received the `{id}` message.
    Recipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoIdentity,
    WrongUser,
    NotCorrespondent,
    NotRecipient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Allowed,
    Denied(DenyReason),
}

#[derive(Debug, Clone)]
pub struct AuthStatus {
    pub claim: Option<Claims>,
    pub decision: Decision,
}

/// The addressed resource, as raw path parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Target<'a> {
    pub username: Option<&'a str>,
    pub message_id: Option<&'a str>,
}

/// Resolves a message id to `(from_username, to_username)`.
pub trait MessageParties {
    fn parties(&self, id: i64) -> Option<(String, String)>;
}

impl MessageParties for MessageStore {
    fn parties(&self, id: i64) -> Option<(String, String)> {
        match self.get_by_id(id) {
            Ok(msg) => Some((msg.from_user.username, msg.to_user.username)),
            Err(crate::ApiError::NotFound(_)) => None,
            Err(e) => {
                warn!("Message lookup for authorization failed: {}", e);
                None
            }
        }
    }
}

pub const LOGGED_IN: &[Predicate] = &[Predicate::LoggedIn];
pub const CORRECT_USER: &[Predicate] = &[Predicate::LoggedIn, Predicate::CorrectUser];
pub const CORRESPONDENT: &[Predicate] = &[Predicate::LoggedIn, Predicate::Correspondent];
pub const RECIPIENT: &[Predicate] = &[Predicate::LoggedIn, Predicate::Recipient];

impl Predicate {
    pub fn evaluate(
        self,
        claim: Option<&Claims>,
        target: &Target<'_>,
        messages: &dyn MessageParties,
    ) -> Result<(), DenyReason> {
        match self {
            Self::LoggedIn => claim.map(|_| ()).ok_or(DenyReason::NoIdentity),
            Self::CorrectUser => {
                let claim = claim.ok_or(DenyReason::NoIdentity)?;
                if target.username == Some(claim.username.as_str()) {
                    Ok(())
                } else {
                    Err(DenyReason::WrongUser)
                }
            }
            Self::Correspondent => {
                let claim = claim.ok_or(DenyReason::NoIdentity)?;
                match lookup(target, messages) {
                    Some((from, to)) if claim.username == from || claim.username == to => Ok(()),
                    _ => Err(DenyReason::NotCorrespondent),
                }
            }
            Self::Recipient => {
                let claim = claim.ok_or(DenyReason::NoIdentity)?;
                match lookup(target, messages) {
                    Some((_, to)) if claim.username == to => Ok(()),
                    _ => Err(DenyReason::NotRecipient),
                }
            }
        }
    }
}

fn lookup(target: &Target<'_>, messages: &dyn MessageParties) -> Option<(String, String)> {
    let id = target.message_id?.parse::<i64>().ok()?;
    messages.parties(id)
}

impl AuthStatus {
    pub fn new(claim: Option<Claims>) -> Self {
        Self {
            claim,
            decision: Decision::Pending,
        }
    }

    /// Apply one predicate. A denied status is terminal.
    pub fn apply(mut self, predicate: Predicate, target: &Target<'_>, messages: &dyn MessageParties) -> Self {
        if matches!(self.decision, Decision::Denied(_)) {
            return self;
        }
        if let Err(reason) = predicate.evaluate(self.claim.as_ref(), target, messages) {
            self.decision = Decision::Denied(reason);
        }
        self
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allowed
    }
}

/// Evaluate `chain` in order, short-circuiting on the first denial.
pub fn run(
    chain: &[Predicate],
    claim: Option<Claims>,
    target: &Target<'_>,
    messages: &dyn MessageParties,
) -> AuthStatus {
    let mut status = AuthStatus::new(claim);
    for &predicate in chain {
        status = status.apply(predicate, target, messages);
        if matches!(status.decision, Decision::Denied(_)) {
            return status;
        }
    }
    status.decision = Decision::Allowed;
    status
}
