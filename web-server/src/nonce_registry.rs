// web-server/src/nonce_registry.rs
use actix::{Actor, Context, Handler, Message, AsyncContext, MessageResult};
use chrono::{Duration as ChronoDuration, Utc};
use common::models::nonce::{Nonce, NonceCheck};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use crate::utils::token::generate_nonce;

// Default nonce TTL in seconds (5 minutes)
const DEFAULT_NONCE_TTL: i64 = 300;

// Cleanup interval in seconds
const CLEANUP_INTERVAL: u64 = 60;

// Outstanding nonces kept per attempt; older ones are burned
const MAX_NONCES_PER_ATTEMPT: usize = 8;

/// Actor message: Issue a fresh nonce for a sign-in attempt.
/// Nonces already issued to the attempt stay valid.
#[derive(Message)]
#[rtype(result = "Nonce")]
pub struct IssueNonce {
    pub attempt_id: String,
}

/// Actor message: Consume the nonce of a message that passed every other
/// check.
///
/// The candidate is burned whatever the outcome. On `Valid` the attempt is
/// closed and its other outstanding nonces are burned too, so one attempt
/// yields at most one session.
#[derive(Message)]
#[rtype(result = "NonceCheck")]
pub struct ConsumeNonce {
    pub attempt_id: Option<String>,
    pub candidate: String,
}

/// Actor message: Burn the nonce of a rejected message. Other nonces of the
/// same attempt are untouched.
#[derive(Message)]
#[rtype(result = "()")]
pub struct BurnNonce {
    pub candidate: String,
}

/// Actor message: Drop expired nonce records
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredNonces;

/// Single-use nonce store. The mailbox serialises consumption, so a nonce
/// validates for at most one of any number of concurrent submissions.
pub struct NonceRegistryActor {
    // Map from nonce value to its record
    nonces: Arc<DashMap<String, Nonce>>,
    // Map from attempt id to its outstanding nonce values, oldest first
    attempts: Arc<DashMap<String, Vec<String>>>,
    nonce_ttl: i64,
}

impl Default for NonceRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceRegistryActor {
    pub fn new() -> Self {
        Self {
            nonces: Arc::new(DashMap::new()),
            attempts: Arc::new(DashMap::new()),
            nonce_ttl: DEFAULT_NONCE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.nonce_ttl = ttl_seconds;
        self
    }

    fn burn(&self, value: &str) {
        if let Some(mut entry) = self.nonces.get_mut(value) {
            entry.value_mut().consumed = true;
        }
    }

    /// Take `value` off its attempt's outstanding list
    fn detach(&self, attempt_id: &str, value: &str) {
        let now_empty = match self.attempts.get_mut(attempt_id) {
            Some(mut outstanding) => {
                outstanding.retain(|v| v != value);
                outstanding.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.attempts.remove(attempt_id);
        }
    }

    /// Burn every outstanding nonce of an attempt and forget it
    fn close_attempt(&self, attempt_id: &str) {
        if let Some((_, outstanding)) = self.attempts.remove(attempt_id) {
            for value in &outstanding {
                self.burn(value);
            }
            if !outstanding.is_empty() {
                tracing::debug!("Closed attempt, burned {} sibling nonces", outstanding.len());
            }
        }
    }

    fn cleanup_nonces(&mut self) -> usize {
        let now = Utc::now();
        let before = self.nonces.len();

        self.nonces.retain(|_, nonce| !nonce.is_expired_at(now));
        let nonces = self.nonces.clone();
        self.attempts.retain(|_, outstanding| {
            outstanding.retain(|value| nonces.contains_key(value));
            !outstanding.is_empty()
        });

        before - self.nonces.len()
    }
}

impl Actor for NonceRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("NonceRegistryActor started with TTL: {}s", self.nonce_ttl);

        ctx.run_interval(Duration::from_secs(CLEANUP_INTERVAL), |act, _ctx| {
            let expired_count = act.cleanup_nonces();
            if expired_count > 0 {
                tracing::debug!("Cleaned up {} expired nonces", expired_count);
            }
        });
    }
}

impl Handler<IssueNonce> for NonceRegistryActor {
    type Result = MessageResult<IssueNonce>;

    fn handle(&mut self, msg: IssueNonce, _ctx: &mut Self::Context) -> Self::Result {
        let nonce = Nonce::new(
            generate_nonce(),
            msg.attempt_id.clone(),
            ChronoDuration::seconds(self.nonce_ttl),
        );
        self.nonces.insert(nonce.value.clone(), nonce.clone());

        let evicted = {
            let mut outstanding = self.attempts.entry(msg.attempt_id).or_default();
            outstanding.push(nonce.value.clone());
            let excess = outstanding.len().saturating_sub(MAX_NONCES_PER_ATTEMPT);
            outstanding.drain(..excess).collect::<Vec<_>>()
        };
        for value in &evicted {
            self.burn(value);
        }

        tracing::debug!("Issued nonce expiring at {}", nonce.expires_at);
        MessageResult(nonce)
    }
}

impl Handler<ConsumeNonce> for NonceRegistryActor {
    type Result = MessageResult<ConsumeNonce>;

    fn handle(&mut self, msg: ConsumeNonce, _ctx: &mut Self::Context) -> Self::Result {
        let now = Utc::now();

        let (check, owner) = match self.nonces.get_mut(&msg.candidate) {
            None => (NonceCheck::Replayed, None),
            Some(mut entry) => {
                let nonce = entry.value_mut();
                let check = if nonce.consumed {
                    NonceCheck::Replayed
                } else if msg.attempt_id.as_deref() != Some(nonce.attempt_id.as_str()) {
                    NonceCheck::AttemptMismatch
                } else if nonce.is_expired_at(now) {
                    NonceCheck::Expired
                } else {
                    NonceCheck::Valid
                };
                nonce.consumed = true;
                (check, Some(nonce.attempt_id.clone()))
            }
        };

        if let Some(owner) = owner {
            if check == NonceCheck::Valid {
                self.close_attempt(&owner);
            } else {
                self.detach(&owner, &msg.candidate);
            }
        }

        tracing::debug!("Nonce consumed with outcome {:?}", check);
        MessageResult(check)
    }
}

impl Handler<BurnNonce> for NonceRegistryActor {
    type Result = ();

    fn handle(&mut self, msg: BurnNonce, _ctx: &mut Self::Context) -> Self::Result {
        let owner = self.nonces.get_mut(&msg.candidate).map(|mut entry| {
            entry.value_mut().consumed = true;
            entry.value().attempt_id.clone()
        });
        if let Some(owner) = owner {
            self.detach(&owner, &msg.candidate);
        }
    }
}

impl Handler<CleanupExpiredNonces> for NonceRegistryActor {
    type Result = MessageResult<CleanupExpiredNonces>;

    fn handle(&mut self, _msg: CleanupExpiredNonces, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.cleanup_nonces())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consume(attempt_id: &str, candidate: &str) -> ConsumeNonce {
        ConsumeNonce {
            attempt_id: Some(attempt_id.to_string()),
            candidate: candidate.to_string(),
        }
    }

    #[actix_web::test]
    async fn test_nonce_validates_once() {
        let registry = NonceRegistryActor::new().start();
        let nonce = registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();

        let first = registry.send(consume("a1", &nonce.value)).await.unwrap();
        let second = registry.send(consume("a1", &nonce.value)).await.unwrap();

        assert_eq!(first, NonceCheck::Valid);
        assert_eq!(second, NonceCheck::Replayed);
    }

    #[actix_web::test]
    async fn test_unknown_nonce_is_replay() {
        let registry = NonceRegistryActor::new().start();
        let check = registry.send(consume("a1", "neverissued123")).await.unwrap();
        assert_eq!(check, NonceCheck::Replayed);
    }

    #[actix_web::test]
    async fn test_expired_nonce_rejected_and_burned() {
        let registry = NonceRegistryActor::new().with_ttl(0).start();
        let nonce = registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();

        let check = registry.send(consume("a1", &nonce.value)).await.unwrap();
        assert_eq!(check, NonceCheck::Expired);

        let retry = registry.send(consume("a1", &nonce.value)).await.unwrap();
        assert_eq!(retry, NonceCheck::Replayed);
    }

    #[actix_web::test]
    async fn test_nonce_bound_to_attempt() {
        let registry = NonceRegistryActor::new().start();
        let nonce = registry.send(IssueNonce { attempt_id: "victim".into() }).await.unwrap();

        let stolen = registry.send(consume("attacker", &nonce.value)).await.unwrap();
        assert_eq!(stolen, NonceCheck::AttemptMismatch);

        let cookieless = registry
            .send(ConsumeNonce { attempt_id: None, candidate: nonce.value })
            .await
            .unwrap();
        assert_eq!(cookieless, NonceCheck::Replayed);
    }

    #[actix_web::test]
    async fn test_sibling_nonces_stay_valid_until_success() {
        let registry = NonceRegistryActor::new().start();
        let tab_a = registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();
        let tab_b = registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();
        let tab_c = registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();
        assert_ne!(tab_a.value, tab_b.value);

        // A rejected message burns its own nonce only
        registry.send(BurnNonce { candidate: tab_a.value.clone() }).await.unwrap();
        assert_eq!(registry.send(consume("a1", &tab_a.value)).await.unwrap(), NonceCheck::Replayed);

        // The first success closes the attempt
        assert_eq!(registry.send(consume("a1", &tab_b.value)).await.unwrap(), NonceCheck::Valid);
        assert_eq!(registry.send(consume("a1", &tab_c.value)).await.unwrap(), NonceCheck::Replayed);
    }

    #[actix_web::test]
    async fn test_outstanding_nonces_are_capped() {
        let registry = NonceRegistryActor::new().start();
        let oldest = registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();
        for _ in 0..MAX_NONCES_PER_ATTEMPT {
            registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();
        }

        assert_eq!(registry.send(consume("a1", &oldest.value)).await.unwrap(), NonceCheck::Replayed);
    }

    #[actix_web::test]
    async fn test_concurrent_consumption_single_winner() {
        let registry = NonceRegistryActor::new().start();
        let nonce = registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();

        let sends = (0..16).map(|_| registry.send(consume("a1", &nonce.value)));
        let results = futures_util::future::join_all(sends).await;

        let valid = results
            .into_iter()
            .filter(|r| matches!(r, Ok(NonceCheck::Valid)))
            .count();
        assert_eq!(valid, 1);
    }

    #[actix_web::test]
    async fn test_concurrent_tabs_single_winner() {
        let registry = NonceRegistryActor::new().start();
        let mut values = Vec::new();
        for _ in 0..4 {
            values.push(registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap().value);
        }

        let sends = values.iter().map(|value| registry.send(consume("a1", value)));
        let results = futures_util::future::join_all(sends).await;

        let valid = results
            .into_iter()
            .filter(|r| matches!(r, Ok(NonceCheck::Valid)))
            .count();
        assert_eq!(valid, 1);
    }

    #[actix_web::test]
    async fn test_cleanup_removes_expired() {
        let registry = NonceRegistryActor::new().with_ttl(0).start();
        registry.send(IssueNonce { attempt_id: "a1".into() }).await.unwrap();
        registry.send(IssueNonce { attempt_id: "a2".into() }).await.unwrap();

        let removed = registry.send(CleanupExpiredNonces).await.unwrap();
        assert_eq!(removed, 2);
    }
}
