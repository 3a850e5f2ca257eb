use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use letterbox_types::api::Claims;

/// Signs and verifies HS256 bearer tokens.
///
/// Verification never errors to the caller: a missing, malformed, forged or
/// expired token simply resolves to no identity.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl,
        }
    }

    pub fn sign(&self, username: &str) -> anyhow::Result<String> {
        let now = chrono::Utc::now();
        let claims = Claims {
            username: username.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn resolve_identity(&self, token: Option<&str>) -> Option<Claims> {
        let token = token?;
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!("Rejected bearer token: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", chrono::Duration::hours(1))
    }

    #[test]
    fn signed_token_resolves_to_username() {
        let tokens = service();
        let token = tokens.sign("alice").unwrap();

        let claims = tokens.resolve_identity(Some(&token)).unwrap();
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn missing_or_garbage_token_is_anonymous() {
        let tokens = service();
        assert!(tokens.resolve_identity(None).is_none());
        assert!(tokens.resolve_identity(Some("")).is_none());
        assert!(tokens.resolve_identity(Some("not.a.jwt")).is_none());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let forged = TokenService::new("someone-else", chrono::Duration::hours(1))
            .sign("alice")
            .unwrap();
        assert!(service().resolve_identity(Some(&forged)).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Well past the default 60s validation leeway.
        let expired = TokenService::new("test-secret", chrono::Duration::hours(-2))
            .sign("alice")
            .unwrap();
        assert!(service().resolve_identity(Some(&expired)).is_none());
    }
}
