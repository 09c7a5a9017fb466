//! HS256 session tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Lifetime of a token issued by credential login.
pub const CREDENTIALS_TTL: Duration = Duration::days(1);
/// Lifetime of a token issued by Google login.
pub const GOOGLE_TTL: Duration = Duration::days(7);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKeys(..)")
    }
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn issue(&self, user_id: &str, email: Option<&str>, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_owned(),
            email: email.map(str::to_owned),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Fails closed: any signature, format or expiry problem yields `None`.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "rejecting session token");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify_with_same_secret_only() {
        let keys = TokenKeys::new(b"secret-a");
        let token = keys.issue("user-1", Some("a@b.c"), CREDENTIALS_TTL).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("a@b.c"));
        assert_eq!(claims.exp - claims.iat, CREDENTIALS_TTL.num_seconds());

        assert!(TokenKeys::new(b"secret-b").verify(&token).is_none());
        assert!(keys.verify("not-a-jwt").is_none());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = TokenKeys::new(b"secret");
        let token = keys.issue("user-1", None, Duration::days(-1)).unwrap();
        assert!(keys.verify(&token).is_none());
    }
}
