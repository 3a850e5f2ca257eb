use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use letterbox_db::models::MessageRow;
use letterbox_db::{Database, StoreError};
use letterbox_types::models::{MessageDetail, NewMessage, ReadReceipt};

use crate::directory::public_user;
use crate::error::ApiError;

/// Owns message records. Validates that both parties exist on send and
/// performs the one-way unread → read transition.
pub struct MessageStore {
    db: Arc<Database>,
}

impl MessageStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, from_username: &str, to_username: &str, body: &str) -> Result<NewMessage, ApiError> {
        if body.trim().is_empty() {
            return Err(ApiError::BadRequest("Message body must not be empty".into()));
        }

        let row = self
            .db
            .insert_message(from_username, to_username, body, Utc::now())
            .map_err(|e| match e {
                StoreError::UnknownUser(ref name) if name == to_username => {
                    warn!("{} tried to message unknown user {}", from_username, name);
                    ApiError::BadRequest("Recipient does not exist".into())
                }
                StoreError::UnknownUser(_) => ApiError::BadRequest("Sender does not exist".into()),
                other => other.into(),
            })?;

        info!("Message {} sent from {} to {}", row.id, row.from_username, row.to_username);
        Ok(NewMessage {
            id: row.id,
            from_username: row.from_username,
            to_username: row.to_username,
            body: row.body,
            sent_at: row.sent_at,
        })
    }

    pub fn get_by_id(&self, id: i64) -> Result<MessageDetail, ApiError> {
        let MessageRow { id, from_user, to_user, body, sent_at, read_at } = self
            .db
            .get_message(id)?
            .ok_or(StoreError::MessageNotFound(id))?;

        Ok(MessageDetail {
            id,
            from_user: public_user(from_user),
            to_user: public_user(to_user),
            body,
            sent_at,
            read_at,
        })
    }

    /// Sets `read_at` once. A second call fails with `Conflict` and leaves
    /// the original timestamp untouched.
    pub fn mark_read(&self, id: i64) -> Result<ReadReceipt, ApiError> {
        let read_at = self.db.mark_message_read(id, Utc::now())?;
        info!("Message {} marked read", id);
        Ok(ReadReceipt { id, read_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::UserDirectory;
    use crate::directory::tests::{TEST_COST, register_request};

    fn store_with_users(names: &[&str]) -> MessageStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dir = UserDirectory::new(db.clone(), TEST_COST.hasher().unwrap());
        for name in names {
            dir.register(&register_request(name)).unwrap();
        }
        MessageStore::new(db)
    }

    #[test]
    fn create_validates_recipient_and_body() {
        let store = store_with_users(&["alice"]);

        let err = store.create("alice", "ghost", "hello").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Recipient does not exist"));

        let err = store.create("alice", "alice", "   ").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn self_messages_are_allowed() {
        let store = store_with_users(&["alice"]);
        let msg = store.create("alice", "alice", "note to self").unwrap();
        let detail = store.get_by_id(msg.id).unwrap();
        assert_eq!(detail.from_user, detail.to_user);
    }

    #[test]
    fn read_state_moves_one_way() {
        let store = store_with_users(&["alice", "bob"]);
        let sent = store.create("alice", "bob", "hi").unwrap();

        let detail = store.get_by_id(sent.id).unwrap();
        assert!(detail.read_at.is_none());
        assert_eq!(detail.from_user.username, "alice");
        assert_eq!(detail.to_user.username, "bob");

        let receipt = store.mark_read(sent.id).unwrap();
        assert!(receipt.read_at >= sent.sent_at);

        let err = store.mark_read(sent.id).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let detail = store.get_by_id(sent.id).unwrap();
        assert_eq!(detail.read_at, Some(receipt.read_at));
    }

    #[test]
    fn unknown_message_is_not_found() {
        let store = store_with_users(&["alice"]);
        assert!(matches!(store.get_by_id(999), Err(ApiError::NotFound(_))));
        assert!(matches!(store.mark_read(999), Err(ApiError::NotFound(_))));
    }
}
