//! Database row types. These map directly to SQLite rows and are kept
//! distinct from the letterbox-types wire models.

use chrono::{DateTime, Utc};

#[derive(Debug)]
pub struct UserRow {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub join_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

/// Columns inserted for a new user; timestamps are filled by the query.
#[derive(Debug)]
pub struct NewUserRow<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: &'a str,
}

/// The public columns of a user, joined onto message rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: i64,
    pub from_user: PartyRow,
    pub to_user: PartyRow,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// A message seen from one side of the conversation; `other` is the
/// recipient for an outbox row and the sender for an inbox row.
#[derive(Debug)]
pub struct MailboxRow {
    pub id: i64,
    pub other: PartyRow,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct InsertedMessageRow {
    pub id: i64,
    pub from_username: String,
    pub to_username: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}
