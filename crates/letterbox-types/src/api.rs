use serde::{Deserialize, Serialize};

use crate::models::{MessageDetail, NewMessage, PublicUser, ReadReceipt, ReceivedMessage, SentMessage, UserProfile};

// -- JWT Claims --

/// Bearer token payload. The username is the only identity carried; it is
/// trusted for the lifetime of the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(rename = "_token", default)]
    pub token: Option<String>,
}

/// `_token` is accepted and ignored, like on every other JSON body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(rename = "_token", default)]
    pub token: Option<String>,
}

/// Returned by both register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// -- Users --

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct SentMessagesResponse {
    pub messages: Vec<SentMessage>,
}

#[derive(Debug, Serialize)]
pub struct ReceivedMessagesResponse {
    pub messages: Vec<ReceivedMessage>,
}

// -- Messages --

/// The sender is always the authenticated caller, so only the recipient
/// and body are accepted. `_token` may ride along in the body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub to_username: String,
    pub body: String,
    #[serde(rename = "_token", default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: MessageDetail,
}

#[derive(Debug, Serialize)]
pub struct NewMessageResponse {
    pub message: NewMessage,
}

#[derive(Debug, Serialize)]
pub struct ReadReceiptResponse {
    pub message: ReadReceipt,
}

// -- Errors --

/// Uniform failure body for every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_accepts_body_token() {
        let req: SendMessageRequest = serde_json::from_str(
            r#"{"to_username":"bob","body":"hi","_token":"abc"}"#,
        )
        .unwrap();
        assert_eq!(req.to_username, "bob");
        assert_eq!(req.token.as_deref(), Some("abc"));
    }

    #[test]
    fn send_request_rejects_sender_override() {
        let result: Result<SendMessageRequest, _> = serde_json::from_str(
            r#"{"from_username":"mallory","to_username":"bob","body":"hi"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn auth_requests_tolerate_body_token() {
        let login: LoginRequest =
            serde_json::from_str(r#"{"username":"alice","password":"hunter22","_token":"stale"}"#).unwrap();
        assert_eq!(login.username, "alice");
        assert_eq!(login.token.as_deref(), Some("stale"));

        let register: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","password":"hunter22","first_name":"A","last_name":"L","phone":"1","_token":""}"#,
        )
        .unwrap();
        assert_eq!(register.phone, "1");
    }

    #[test]
    fn auth_requests_still_reject_other_fields() {
        let result: Result<LoginRequest, _> =
            serde_json::from_str(r#"{"username":"alice","password":"hunter22","admin":true}"#);
        assert!(result.is_err());
    }
}
