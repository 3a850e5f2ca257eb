use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use tracing::{info, warn};

use letterbox_db::Database;
use letterbox_db::models::{MailboxRow, NewUserRow, PartyRow, UserRow};
use letterbox_types::api::RegisterRequest;
use letterbox_types::models::{PublicUser, ReceivedMessage, SentMessage, UserProfile};

use crate::error::ApiError;

/// Argon2id work factor.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashCost {
    pub fn hasher(&self) -> Result<Argon2<'static>, argon2::Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Owns user records: registration, password checks, profiles and the
/// per-user message lists.
pub struct UserDirectory {
    db: Arc<Database>,
    hasher: Argon2<'static>,
}

impl UserDirectory {
    pub fn new(db: Arc<Database>, hasher: Argon2<'static>) -> Self {
        Self { db, hasher }
    }

    /// Create a user. The returned row still carries the password hash;
    /// redaction is the caller's job.
    pub fn register(&self, req: &RegisterRequest) -> Result<UserRow, ApiError> {
        validate_registration(req)?;

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .hasher
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?
            .to_string();

        let row = self.db.create_user(
            &NewUserRow {
                username: &req.username,
                password_hash: &password_hash,
                first_name: req.first_name.trim(),
                last_name: req.last_name.trim(),
                phone: req.phone.trim(),
            },
            Utc::now(),
        )?;

        info!("Registered user {}", row.username);
        Ok(row)
    }

    /// Unknown usernames and wrong passwords both come back as `false`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool, ApiError> {
        let Some(user) = self.db.get_user_by_username(username)? else {
            return Ok(false);
        };

        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| ApiError::Internal(format!("stored hash for {} unreadable: {}", username, e)))?;

        Ok(self
            .hasher
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn update_login_timestamp(&self, username: &str) -> Result<(), ApiError> {
        if !self.db.touch_last_login(username, Utc::now())? {
            warn!("Login timestamp update matched no user: {}", username);
        }
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<PublicUser>, ApiError> {
        Ok(self.db.list_users()?.into_iter().map(public_user).collect())
    }

    pub fn get_by_username(&self, username: &str) -> Result<UserProfile, ApiError> {
        let user = self
            .db
            .get_user_by_username(username)?
            .ok_or_else(|| ApiError::NotFound(format!("User '{}' not found", username)))?;

        Ok(UserProfile {
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            join_at: user.join_at,
            last_login_at: user.last_login_at,
        })
    }

    pub fn messages_from(&self, username: &str) -> Result<Vec<SentMessage>, ApiError> {
        let rows = self.db.get_messages_from(username)?;
        Ok(rows
            .into_iter()
            .map(|MailboxRow { id, other, body, sent_at, read_at }| SentMessage {
                id,
                to_user: public_user(other),
                body,
                sent_at,
                read_at,
            })
            .collect())
    }

    pub fn messages_to(&self, username: &str) -> Result<Vec<ReceivedMessage>, ApiError> {
        let rows = self.db.get_messages_to(username)?;
        Ok(rows
            .into_iter()
            .map(|MailboxRow { id, other, body, sent_at, read_at }| ReceivedMessage {
                id,
                from_user: public_user(other),
                body,
                sent_at,
                read_at,
            })
            .collect())
    }
}

pub(crate) fn public_user(row: PartyRow) -> PublicUser {
    PublicUser {
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        phone: row.phone,
    }
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let username_ok = (3..=32).contains(&req.username.len())
        && req
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !username_ok {
        warn!("Rejected registration: invalid username {:?}", req.username);
        return Err(ApiError::BadRequest(
            "Username must be 3-32 characters of letters, digits, '_', '.' or '-'".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("Password must be at least 8 characters".into()));
    }
    for (field, value) in [
        ("first_name", &req.first_name),
        ("last_name", &req.last_name),
        ("phone", &req.phone),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::BadRequest(format!("{} is required", field)));
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Cheapest parameters Argon2 accepts.
    pub(crate) const TEST_COST: HashCost = HashCost {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    };

    pub(crate) fn register_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "password".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            phone: "+14155550000".to_string(),
            token: None,
        }
    }

    fn directory() -> UserDirectory {
        let db = Arc::new(Database::open_in_memory().unwrap());
        UserDirectory::new(db, TEST_COST.hasher().unwrap())
    }

    #[test]
    fn register_hashes_password() {
        let dir = directory();
        let row = dir.register(&register_request("alice")).unwrap();
        assert_ne!(row.password, "password");
        assert!(row.password.starts_with("$argon2id$"));
        assert_eq!(row.join_at, row.last_login_at);
    }

    #[test]
    fn register_rejects_duplicates_and_bad_input() {
        let dir = directory();
        dir.register(&register_request("alice")).unwrap();

        assert!(matches!(
            dir.register(&register_request("alice")),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            dir.register(&register_request("al")),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            dir.register(&register_request("bad name")),
            Err(ApiError::BadRequest(_))
        ));

        let mut short = register_request("bob");
        short.password = "short".into();
        assert!(matches!(dir.register(&short), Err(ApiError::BadRequest(_))));

        let mut nameless = register_request("carol");
        nameless.first_name = "  ".into();
        assert!(matches!(dir.register(&nameless), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn authenticate_outcomes_are_indistinguishable() {
        let dir = directory();
        dir.register(&register_request("alice")).unwrap();

        assert!(dir.authenticate("alice", "password").unwrap());
        assert!(!dir.authenticate("alice", "wrong-password").unwrap());
        assert!(!dir.authenticate("nobody", "password").unwrap());
    }

    #[test]
    fn profile_and_listing_omit_password() {
        let dir = directory();
        dir.register(&register_request("bob")).unwrap();
        dir.register(&register_request("alice")).unwrap();

        let all = dir.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].username, "alice");

        let profile = dir.get_by_username("bob").unwrap();
        assert_eq!(profile.first_name, "Test");
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password").is_none());

        assert!(matches!(dir.get_by_username("nobody"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn login_timestamp_advances() {
        let dir = directory();
        let created = dir.register(&register_request("alice")).unwrap();
        dir.update_login_timestamp("alice").unwrap();

        let profile = dir.get_by_username("alice").unwrap();
        assert!(profile.last_login_at >= created.last_login_at);
        assert_eq!(profile.join_at, created.join_at);
    }
}
