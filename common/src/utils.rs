// common/src/utils.rs
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use jsonwebtoken::{encode, decode, Header, Algorithm, Validation, EncodingKey, DecodingKey};
use serde::{Serialize, Deserialize};

use crate::models::session::Session;

fn subscriber(level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    FmtSubscriber::builder()
        .with_max_level(level)
        .finish()
}

/// Setup tracing for consistent logging across services
pub fn setup_tracing(level: &str) {
    tracing::subscriber::set_global_default(subscriber(level))
        .expect("Failed to set tracing subscriber");
}

/// Run `f` with info-level logging, for startup work that happens before
/// the configured level is known
pub fn with_bootstrap_tracing<T>(f: impl FnOnce() -> T) -> T {
    tracing::subscriber::with_default(subscriber("info"), f)
}

/// Claims carried by the session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,   // canonical wallet address
    pub sid: String,   // server-side session id
    pub chain: u64,
    pub iat: i64,
    pub exp: i64,
}

impl From<&Session> for SessionClaims {
    fn from(session: &Session) -> Self {
        Self {
            sub: session.address.to_string(),
            sid: session.session_id.clone(),
            chain: session.chain_id,
            iat: session.issued_at.timestamp(),
            exp: session.expires_at.timestamp(),
        }
    }
}

/// Sign session claims with the server secret
pub fn encode_session_token(claims: &SessionClaims, secret: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret)
    )
}

/// Check signature and expiry of a session token and return its claims
pub fn decode_session_token(token: &str, secret: &[u8]) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &validation
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn claims(exp_offset: i64) -> SessionClaims {
        let now = Utc::now().timestamp();
        SessionClaims {
            sub: "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".to_string(),
            sid: "abc".to_string(),
            chain: 1,
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let claims = claims(3600);
        let token = encode_session_token(&claims, SECRET).unwrap();
        assert_eq!(decode_session_token(&token, SECRET).unwrap(), claims);
    }

    #[test]
    fn test_rejects_expired_token() {
        let token = encode_session_token(&claims(-10), SECRET).unwrap();
        assert!(decode_session_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_rejects_foreign_secret() {
        let token = encode_session_token(&claims(3600), SECRET).unwrap();
        assert!(decode_session_token(&token, b"another-secret-another-secret-xx").is_err());
    }

    #[test]
    fn test_rejects_tampered_token() {
        let token = encode_session_token(&claims(3600), SECRET).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = parts[1].chars().rev().collect();
        assert!(decode_session_token(&parts.join("."), SECRET).is_err());
    }
}
