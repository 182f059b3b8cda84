// web-server/src/session_issuer.rs
use actix::Addr;
use chrono::Duration;
use common::models::session::{Session, VerifiedIdentity};
use common::{encode_session_token, AuthError, SessionClaims};
use std::sync::Arc;
use crate::identity::IdentityResolver;
use crate::session_registry::{RegisterSession, RevokeSession, SessionRegistryActor};
use crate::utils::token::create_session_id;

/// A session together with the signed token handed to the browser
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

/// The only component that creates authenticated sessions
pub struct SessionIssuer {
    secret: Vec<u8>,
    session_ttl: Duration,
    sessions: Addr<SessionRegistryActor>,
    resolver: Arc<IdentityResolver>,
}

impl SessionIssuer {
    pub fn new(
        secret: Vec<u8>,
        session_ttl: Duration,
        sessions: Addr<SessionRegistryActor>,
        resolver: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            secret,
            session_ttl,
            sessions,
            resolver,
        }
    }

    /// Resolve the user behind `verified` and open a session for them.
    /// Nothing is stored unless the identity resolves.
    pub async fn issue(&self, verified: VerifiedIdentity) -> Result<IssuedSession, AuthError> {
        let identity = self.resolver.resolve(&verified.address).await?;

        let session = Session::new(create_session_id(), &verified, &identity, self.session_ttl);
        let token = encode_session_token(&SessionClaims::from(&session), &self.secret)
            .map_err(|e| AuthError::StorageUnavailable(format!("session token encoding: {}", e)))?;

        self.sessions
            .send(RegisterSession {
                session: session.clone(),
            })
            .await?;

        tracing::info!(
            "Session issued for {} (user {}, handle {}) until {}",
            session.address,
            session.user_id,
            session.handle,
            session.expires_at
        );

        Ok(IssuedSession { token, session })
    }

    /// Revoke a session before it expires. Returns whether it was live.
    pub async fn revoke(&self, session_id: &str) -> Result<bool, AuthError> {
        let revoked = self
            .sessions
            .send(RevokeSession {
                session_id: session_id.to_string(),
            })
            .await?;
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::Actor;
    use chrono::Utc;
    use common::models::session::SessionResult;
    use common::{decode_session_token, WalletAddress};
    use crate::identity::InMemoryIdentityStore;
    use crate::session_registry::GetSession;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn verified() -> VerifiedIdentity {
        VerifiedIdentity {
            address: WalletAddress::parse("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap(),
            chain_id: 1,
            verified_at: Utc::now(),
        }
    }

    fn issuer(sessions: Addr<SessionRegistryActor>) -> SessionIssuer {
        let resolver = Arc::new(IdentityResolver::new(Arc::new(InMemoryIdentityStore::new())));
        SessionIssuer::new(SECRET.to_vec(), Duration::days(14), sessions, resolver)
    }

    #[actix_web::test]
    async fn test_issue_registers_session_and_signs_token() {
        let sessions = SessionRegistryActor::new().start();
        let issuer = issuer(sessions.clone());

        let issued = issuer.issue(verified()).await.unwrap();
        assert_eq!(issued.session.handle, "user_ef1beaed");

        let claims = decode_session_token(&issued.token, SECRET).unwrap();
        assert_eq!(claims.sub, issued.session.address.to_string());
        assert_eq!(claims.sid, issued.session.session_id);

        let stored = sessions
            .send(GetSession { session_id: claims.sid })
            .await
            .unwrap();
        assert!(matches!(stored, SessionResult::Success(_)));
    }

    #[actix_web::test]
    async fn test_repeat_sign_in_keeps_user() {
        let issuer = issuer(SessionRegistryActor::new().start());

        let first = issuer.issue(verified()).await.unwrap();
        let second = issuer.issue(verified()).await.unwrap();
        assert_ne!(first.session.session_id, second.session.session_id);
        assert_eq!(first.session.user_id, second.session.user_id);
    }

    #[actix_web::test]
    async fn test_revoke() {
        let issuer = issuer(SessionRegistryActor::new().start());
        let issued = issuer.issue(verified()).await.unwrap();

        assert!(issuer.revoke(&issued.session.session_id).await.unwrap());
        assert!(!issuer.revoke(&issued.session.session_id).await.unwrap());
    }
}
