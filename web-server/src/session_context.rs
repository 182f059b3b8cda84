// web-server/src/session_context.rs
use actix::Addr;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use common::models::session::{CurrentSession, Session, SessionResult};
use common::{decode_session_token, AuthError, SessionClaims};
use futures_util::future::LocalBoxFuture;
use crate::session_registry::{GetSession, SessionRegistryActor};

/// Cookie carrying the signed session token
pub const SESSION_COOKIE_NAME: &str = "siwe_session";

/// Per-request accessor for the authenticated caller.
///
/// Handlers get the acting identity from here and nowhere else; client
/// supplied identity fields are never trusted.
pub struct SessionContext {
    secret: Vec<u8>,
    sessions: Addr<SessionRegistryActor>,
}

impl SessionContext {
    pub fn new(secret: Vec<u8>, sessions: Addr<SessionRegistryActor>) -> Self {
        Self { secret, sessions }
    }

    /// Verified claims of the request's session cookie, if any
    pub fn claims(&self, req: &HttpRequest) -> Option<SessionClaims> {
        let cookie = req.cookie(SESSION_COOKIE_NAME)?;
        match decode_session_token(cookie.value(), &self.secret) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!("Ignoring session cookie: {}", e);
                None
            }
        }
    }

    /// Resolve the caller of `req`. Store failures are errors, never a
    /// fallback to either state.
    pub async fn current(&self, req: &HttpRequest) -> Result<CurrentSession, AuthError> {
        let claims = match self.claims(req) {
            Some(claims) => claims,
            None => return Ok(CurrentSession::Unauthenticated),
        };

        let result = self
            .sessions
            .send(GetSession {
                session_id: claims.sid.clone(),
            })
            .await?;

        match result {
            SessionResult::Success(session) if session.address.as_str() == claims.sub => {
                Ok(CurrentSession::Authenticated(session))
            }
            SessionResult::Success(session) => {
                tracing::warn!(
                    "Session {} subject mismatch: token {}, stored {}",
                    claims.sid,
                    claims.sub,
                    session.address
                );
                Ok(CurrentSession::Unauthenticated)
            }
            SessionResult::Revoked | SessionResult::Expired | SessionResult::NotFound => {
                Ok(CurrentSession::Unauthenticated)
            }
        }
    }
}

/// Extractor for handlers that need an authenticated caller; rejects with 401
pub struct Authenticated(pub Session);

impl FromRequest for Authenticated {
    type Error = AuthError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let context = req
                .app_data::<web::Data<SessionContext>>()
                .ok_or_else(|| AuthError::StorageUnavailable("session context not configured".into()))?;

            match context.current(&req).await? {
                CurrentSession::Authenticated(session) => Ok(Authenticated(session)),
                CurrentSession::Unauthenticated => Err(AuthError::Unauthenticated),
            }
        })
    }
}
