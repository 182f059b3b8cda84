// web-server/src/session_registry.rs
use actix::{Actor, Context, Handler, Message, AsyncContext, MessageResult};
use chrono::Utc;
use common::models::session::{Session, SessionResult};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

// Cleanup interval in seconds
const CLEANUP_INTERVAL: u64 = 3600;

/// Actor message: Store a freshly issued session
#[derive(Message)]
#[rtype(result = "()")]
pub struct RegisterSession {
    pub session: Session,
}

/// Actor message: Get a session by session id
#[derive(Message)]
#[rtype(result = "SessionResult")]
pub struct GetSession {
    pub session_id: String,
}

/// Actor message: Revoke a session; returns whether it was live
#[derive(Message)]
#[rtype(result = "bool")]
pub struct RevokeSession {
    pub session_id: String,
}

/// Actor message: Clean up expired sessions
#[derive(Message)]
#[rtype(result = "usize")]
pub struct CleanupExpiredSessions;

/// Server-side session store backing revocation.
///
/// Expiry is checked on every read; the periodic sweep only reclaims memory.
pub struct SessionRegistryActor {
    // Map from session id to session data
    sessions: Arc<DashMap<String, Session>>,
}

impl Default for SessionRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistryActor {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Remove expired sessions
    fn cleanup_sessions(&mut self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired_at(now));
        before - self.sessions.len()
    }
}

impl Actor for SessionRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("SessionRegistryActor started");

        // Schedule periodic session cleanup
        ctx.run_interval(Duration::from_secs(CLEANUP_INTERVAL), |act, _ctx| {
            let expired_count = act.cleanup_sessions();
            if expired_count > 0 {
                tracing::info!("Cleaned up {} expired sessions", expired_count);
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("SessionRegistryActor stopped with {} sessions", self.sessions.len());
    }
}

impl Handler<RegisterSession> for SessionRegistryActor {
    type Result = ();

    fn handle(&mut self, msg: RegisterSession, _ctx: &mut Self::Context) -> Self::Result {
        tracing::debug!("Registered session for {}", msg.session.address);
        self.sessions.insert(msg.session.session_id.clone(), msg.session);
    }
}

impl Handler<GetSession> for SessionRegistryActor {
    type Result = MessageResult<GetSession>;

    fn handle(&mut self, msg: GetSession, _ctx: &mut Self::Context) -> Self::Result {
        let result = match self.sessions.get(&msg.session_id) {
            Some(entry) => {
                let session = entry.value();
                if session.revoked {
                    SessionResult::Revoked
                } else if session.is_expired_at(Utc::now()) {
                    tracing::debug!("Session expired for {}", session.address);
                    SessionResult::Expired
                } else {
                    SessionResult::Success(session.clone())
                }
            }
            None => {
                tracing::debug!("Session not found");
                SessionResult::NotFound
            }
        };

        MessageResult(result)
    }
}

impl Handler<RevokeSession> for SessionRegistryActor {
    type Result = MessageResult<RevokeSession>;

    fn handle(&mut self, msg: RevokeSession, _ctx: &mut Self::Context) -> Self::Result {
        let result = match self.sessions.get_mut(&msg.session_id) {
            Some(mut entry) => {
                let session = entry.value_mut();
                let was_live = !session.revoked;
                session.revoked = true;
                if was_live {
                    tracing::info!("Revoked session for {}", session.address);
                }
                was_live
            }
            None => false,
        };

        MessageResult(result)
    }
}

impl Handler<CleanupExpiredSessions> for SessionRegistryActor {
    type Result = MessageResult<CleanupExpiredSessions>;

    fn handle(&mut self, _msg: CleanupExpiredSessions, _ctx: &mut Self::Context) -> Self::Result {
        let expired_count = self.cleanup_sessions();
        tracing::info!("Cleaned up {} expired sessions", expired_count);
        MessageResult(expired_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use common::models::identity::UserIdentity;
    use common::models::session::VerifiedIdentity;
    use common::WalletAddress;

    fn session(id: &str, ttl_seconds: i64) -> Session {
        let address = WalletAddress::parse("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let verified = VerifiedIdentity {
            address: address.clone(),
            chain_id: 1,
            verified_at: Utc::now(),
        };
        let identity = UserIdentity::new(address, "user_ef1beaed".into());
        Session::new(id.to_string(), &verified, &identity, ChronoDuration::seconds(ttl_seconds))
    }

    #[actix_web::test]
    async fn test_register_and_get() {
        let registry = SessionRegistryActor::new().start();
        registry.send(RegisterSession { session: session("s1", 60) }).await.unwrap();

        match registry.send(GetSession { session_id: "s1".into() }).await.unwrap() {
            SessionResult::Success(found) => assert_eq!(found.handle, "user_ef1beaed"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            registry.send(GetSession { session_id: "missing".into() }).await.unwrap(),
            SessionResult::NotFound
        ));
    }

    #[actix_web::test]
    async fn test_revocation_is_immediate() {
        let registry = SessionRegistryActor::new().start();
        registry.send(RegisterSession { session: session("s1", 60) }).await.unwrap();

        assert!(registry.send(RevokeSession { session_id: "s1".into() }).await.unwrap());
        assert!(matches!(
            registry.send(GetSession { session_id: "s1".into() }).await.unwrap(),
            SessionResult::Revoked
        ));
        // Second revoke is a no-op
        assert!(!registry.send(RevokeSession { session_id: "s1".into() }).await.unwrap());
    }

    #[actix_web::test]
    async fn test_expired_session_rejected_on_read() {
        let registry = SessionRegistryActor::new().start();
        registry.send(RegisterSession { session: session("s1", 0) }).await.unwrap();

        assert!(matches!(
            registry.send(GetSession { session_id: "s1".into() }).await.unwrap(),
            SessionResult::Expired
        ));
        assert_eq!(registry.send(CleanupExpiredSessions).await.unwrap(), 1);
    }
}
