// common/src/models/session.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::WalletAddress;
use crate::models::identity::UserIdentity;

/// Result of a successful signature verification, consumed by the session issuer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub address: WalletAddress,
    pub chain_id: u64,
    pub verified_at: DateTime<Utc>,
}

/// Server-side record of an authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Random session id, also carried in the token
    pub session_id: String,
    /// Canonical wallet address; fixed for the life of the session
    pub address: WalletAddress,
    pub chain_id: u64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub handle: String,
    pub revoked: bool,
}

impl Session {
    pub fn new(
        session_id: String,
        verified: &VerifiedIdentity,
        identity: &UserIdentity,
        ttl: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            address: verified.address.clone(),
            chain_id: verified.chain_id,
            issued_at: now,
            expires_at: now + ttl,
            user_id: identity.id,
            handle: identity.handle.clone(),
            revoked: false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of session lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionResult {
    Success(Session),
    NotFound,
    Expired,
    Revoked,
}

/// What the per-request session accessor resolves to
#[derive(Debug, Clone)]
pub enum CurrentSession {
    Authenticated(Session),
    Unauthenticated,
}

/// Response body of `GET /auth/session`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub address: WalletAddress,
    pub chain_id: u64,
    pub user_id: Uuid,
    pub handle: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    // Omit the session id
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            address: session.address.clone(),
            chain_id: session.chain_id,
            user_id: session.user_id,
            handle: session.handle.clone(),
            issued_at: session.issued_at,
            expires_at: session.expires_at,
        }
    }
}
