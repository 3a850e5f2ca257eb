use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use crate::Database;
use crate::error::StoreError;
use crate::models::{InsertedMessageRow, MailboxRow, MessageRow, NewUserRow, PartyRow, UserRow};

impl Database {
    // -- Users --

    /// Insert a user with `join_at` and `last_login_at` both set to `now`.
    pub fn create_user(&self, user: &NewUserRow<'_>, now: DateTime<Utc>) -> Result<UserRow, StoreError> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, first_name, last_name, phone, join_at, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    user.username,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.phone,
                    now,
                ],
            )
            .map_err(|e| {
                if StoreError::is_unique_violation(&e) {
                    StoreError::UsernameTaken(user.username.to_string())
                } else {
                    e.into()
                }
            })?;

            Ok(UserRow {
                username: user.username.to_string(),
                password: user.password_hash.to_string(),
                first_name: user.first_name.to_string(),
                last_name: user.last_name.to_string(),
                phone: user.phone.to_string(),
                join_at: now,
                last_login_at: now,
            })
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn list_users(&self) -> Result<Vec<PartyRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, first_name, last_name, phone FROM users ORDER BY username",
            )?;
            let rows = stmt
                .query_map([], |row| party_at(row, 0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if no user matched.
    pub fn touch_last_login(&self, username: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET last_login_at = ?1 WHERE username = ?2",
                rusqlite::params![now, username],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Messages --

    /// Insert a message after confirming both parties exist. The checks and
    /// the insert share the writer lock.
    pub fn insert_message(
        &self,
        from_username: &str,
        to_username: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<InsertedMessageRow, StoreError> {
        self.with_conn_mut(|conn| {
            if !user_exists(conn, from_username)? {
                return Err(StoreError::UnknownUser(from_username.to_string()));
            }
            if !user_exists(conn, to_username)? {
                return Err(StoreError::UnknownUser(to_username.to_string()));
            }

            conn.execute(
                "INSERT INTO messages (from_username, to_username, body, sent_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![from_username, to_username, body, now],
            )?;

            Ok(InsertedMessageRow {
                id: conn.last_insert_rowid(),
                from_username: from_username.to_string(),
                to_username: to_username.to_string(),
                body: body.to_string(),
                sent_at: now,
            })
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        f.username, f.first_name, f.last_name, f.phone,
                        t.username, t.first_name, t.last_name, t.phone
                 FROM messages m
                 JOIN users f ON m.from_username = f.username
                 JOIN users t ON m.to_username = t.username
                 WHERE m.id = ?1",
                [id],
                |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        body: row.get(1)?,
                        sent_at: row.get(2)?,
                        read_at: row.get(3)?,
                        from_user: party_at(row, 4)?,
                        to_user: party_at(row, 8)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Set `read_at` if it is still null. A single conditional UPDATE, so
    /// of several concurrent callers exactly one succeeds.
    pub fn mark_message_read(&self, id: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>, StoreError> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET read_at = ?1 WHERE id = ?2 AND read_at IS NULL",
                rusqlite::params![now, id],
            )?;
            if changed == 1 {
                return Ok(now);
            }

            let exists = conn
                .query_row("SELECT 1 FROM messages WHERE id = ?1", [id], |_| Ok(()))
                .optional()?
                .is_some();
            if exists {
                Err(StoreError::AlreadyRead(id))
            } else {
                Err(StoreError::MessageNotFound(id))
            }
        })
    }

    /// Outbox: messages sent by `username`, each joined with its recipient.
    pub fn get_messages_from(&self, username: &str) -> Result<Vec<MailboxRow>, StoreError> {
        self.with_conn(|conn| {
            query_mailbox(
                conn,
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        t.username, t.first_name, t.last_name, t.phone
                 FROM messages m
                 JOIN users t ON m.to_username = t.username
                 WHERE m.from_username = ?1
                 ORDER BY m.id",
                username,
            )
        })
    }

    /// Inbox: messages received by `username`, each joined with its sender.
    pub fn get_messages_to(&self, username: &str) -> Result<Vec<MailboxRow>, StoreError> {
        self.with_conn(|conn| {
            query_mailbox(
                conn,
                "SELECT m.id, m.body, m.sent_at, m.read_at,
                        f.username, f.first_name, f.last_name, f.phone
                 FROM messages m
                 JOIN users f ON m.from_username = f.username
                 WHERE m.to_username = ?1
                 ORDER BY m.id",
                username,
            )
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>, StoreError> {
    conn.query_row(
        "SELECT username, password, first_name, last_name, phone, join_at, last_login_at
         FROM users WHERE username = ?1",
        [username],
        |row| {
            Ok(UserRow {
                username: row.get(0)?,
                password: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                phone: row.get(4)?,
                join_at: row.get(5)?,
                last_login_at: row.get(6)?,
            })
        },
    )
    .optional()
}

fn user_exists(conn: &Connection, username: &str) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE username = ?1", [username], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn query_mailbox(conn: &Connection, sql: &str, username: &str) -> Result<Vec<MailboxRow>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([username], |row| {
            Ok(MailboxRow {
                id: row.get(0)?,
                body: row.get(1)?,
                sent_at: row.get(2)?,
                read_at: row.get(3)?,
                other: party_at(row, 4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Read four consecutive user columns starting at `start`.
fn party_at(row: &Row<'_>, start: usize) -> rusqlite::Result<PartyRow> {
    Ok(PartyRow {
        username: row.get(start)?,
        first_name: row.get(start + 1)?,
        last_name: row.get(start + 2)?,
        phone: row.get(start + 3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, StoreError>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, StoreError> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db_with_users(names: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for name in names {
            db.create_user(
                &NewUserRow {
                    username: name,
                    password_hash: "hash",
                    first_name: "First",
                    last_name: "Last",
                    phone: "+14155550000",
                },
                Utc::now(),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn duplicate_username_is_reported() {
        let db = db_with_users(&["alice"]);
        let err = db
            .create_user(
                &NewUserRow {
                    username: "alice",
                    password_hash: "other",
                    first_name: "A",
                    last_name: "B",
                    phone: "1",
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(ref u) if u == "alice"));
    }

    #[test]
    fn new_user_has_matching_timestamps() {
        let db = db_with_users(&["alice"]);
        let row = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.join_at, row.last_login_at);
        assert_eq!(row.password, "hash");
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn touch_last_login_moves_forward() {
        let db = db_with_users(&["alice"]);
        let before = db.get_user_by_username("alice").unwrap().unwrap();
        let later = before.last_login_at + Duration::seconds(5);

        assert!(db.touch_last_login("alice", later).unwrap());
        assert!(!db.touch_last_login("nobody", later).unwrap());

        let after = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(after.last_login_at, later);
        assert_eq!(after.join_at, before.join_at);
    }

    #[test]
    fn insert_message_requires_both_parties() {
        let db = db_with_users(&["alice"]);
        let err = db.insert_message("alice", "ghost", "hi", Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownUser(ref u) if u == "ghost"));

        let err = db.insert_message("ghost", "alice", "hi", Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownUser(ref u) if u == "ghost"));
    }

    #[test]
    fn message_ids_increase_in_creation_order() {
        let db = db_with_users(&["alice", "bob"]);
        let first = db.insert_message("alice", "bob", "one", Utc::now()).unwrap();
        let second = db.insert_message("bob", "alice", "two", Utc::now()).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn get_message_expands_both_parties() {
        let db = db_with_users(&["alice", "bob"]);
        let sent = db.insert_message("alice", "bob", "hi", Utc::now()).unwrap();

        let row = db.get_message(sent.id).unwrap().unwrap();
        assert_eq!(row.from_user.username, "alice");
        assert_eq!(row.to_user.username, "bob");
        assert_eq!(row.to_user.first_name, "First");
        assert!(row.read_at.is_none());

        assert!(db.get_message(sent.id + 100).unwrap().is_none());
    }

    #[test]
    fn mark_read_only_transitions_once() {
        let db = db_with_users(&["alice", "bob"]);
        let sent = db.insert_message("alice", "bob", "hi", Utc::now()).unwrap();

        let read_at = db.mark_message_read(sent.id, Utc::now()).unwrap();
        let err = db
            .mark_message_read(sent.id, read_at + Duration::seconds(10))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRead(id) if id == sent.id));

        let row = db.get_message(sent.id).unwrap().unwrap();
        assert_eq!(row.read_at, Some(read_at));
    }

    #[test]
    fn mark_read_unknown_message() {
        let db = db_with_users(&["alice"]);
        let err = db.mark_message_read(42, Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::MessageNotFound(42)));
    }

    #[test]
    fn mailboxes_join_the_other_party() {
        let db = db_with_users(&["alice", "bob", "carol"]);
        db.insert_message("alice", "bob", "a->b", Utc::now()).unwrap();
        db.insert_message("bob", "alice", "b->a", Utc::now()).unwrap();
        db.insert_message("carol", "bob", "c->b", Utc::now()).unwrap();

        let outbox = db.get_messages_from("alice").unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].other.username, "bob");
        assert_eq!(outbox[0].body, "a->b");

        let inbox = db.get_messages_to("bob").unwrap();
        let senders: Vec<_> = inbox.iter().map(|m| m.other.username.as_str()).collect();
        assert_eq!(senders, ["alice", "carol"]);
    }

    #[test]
    fn list_users_is_sorted() {
        let db = db_with_users(&["carol", "alice", "bob"]);
        let names: Vec<_> = db.list_users().unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
    }
}
