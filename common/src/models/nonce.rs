// common/src/models/nonce.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single-use sign-in nonce bound to one sign-in attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nonce {
    pub value: String,
    /// Opaque id of the attempt (cookie) the nonce was issued to
    pub attempt_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl Nonce {
    pub fn new(value: String, attempt_id: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            value,
            attempt_id,
            issued_at: now,
            expires_at: now + ttl,
            consumed: false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of consuming a nonce. Anything but `Valid` rejects the sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonceCheck {
    Valid,
    Expired,
    /// Never issued, or already consumed
    Replayed,
    /// Issued, but to a different sign-in attempt
    AttemptMismatch,
}
