// common/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::address::AddressError;
use crate::challenge::{ChallengeError, MessageError};
use crate::signature::SignatureError;

/// Failure kinds surfaced by the sign-in and session endpoints.
///
/// The inner strings are for logs only. Responses carry nothing but
/// [`AuthError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("challenge expired: {0}")]
    ExpiredChallenge(String),
    #[error("nonce replay: {0}")]
    NonceReplay(String),
    #[error("invalid signature: {0}")]
    SignatureInvalid(String),
    #[error("domain mismatch: {0}")]
    DomainMismatch(String),
    #[error("identity resolution failed: {0}")]
    IdentityResolution(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("not authenticated")]
    Unauthenticated,
}

impl AuthError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedRequest(_) => "malformed_request",
            AuthError::ExpiredChallenge(_) => "expired_challenge",
            AuthError::NonceReplay(_) => "nonce_replay",
            AuthError::SignatureInvalid(_) => "signature_invalid",
            AuthError::DomainMismatch(_) => "domain_mismatch",
            AuthError::IdentityResolution(_) => "identity_resolution_failure",
            AuthError::StorageUnavailable(_) => "storage_unavailable",
            AuthError::Unauthenticated => "unauthenticated",
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::ExpiredChallenge(_)
            | AuthError::NonceReplay(_)
            | AuthError::SignatureInvalid(_)
            | AuthError::DomainMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::IdentityResolution(_) | AuthError::StorageUnavailable(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "ok": false,
            "error": self.kind()
        }))
    }
}

impl From<MessageError> for AuthError {
    fn from(e: MessageError) -> Self {
        AuthError::MalformedRequest(e.to_string())
    }
}

impl From<SignatureError> for AuthError {
    fn from(e: SignatureError) -> Self {
        AuthError::MalformedRequest(e.to_string())
    }
}

impl From<AddressError> for AuthError {
    fn from(e: AddressError) -> Self {
        AuthError::MalformedRequest(e.to_string())
    }
}

impl From<ChallengeError> for AuthError {
    fn from(e: ChallengeError) -> Self {
        match e {
            ChallengeError::DomainMismatch(_)
            | ChallengeError::UriMismatch(_)
            | ChallengeError::ChainMismatch(_) => AuthError::DomainMismatch(e.to_string()),
            other => AuthError::MalformedRequest(other.to_string()),
        }
    }
}

impl From<actix::MailboxError> for AuthError {
    fn from(e: actix::MailboxError) -> Self {
        AuthError::StorageUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::MalformedRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::NonceReplay("x".into()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AuthError::ExpiredChallenge("x".into()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AuthError::DomainMismatch("x".into()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AuthError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::StorageUnavailable("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_challenge_errors_classified() {
        let err: AuthError = ChallengeError::ChainMismatch(5).into();
        assert_eq!(err.kind(), "domain_mismatch");

        let err: AuthError = ChallengeError::InvalidNonce.into();
        assert_eq!(err.kind(), "malformed_request");

        let err: AuthError = MessageError::NonCanonical.into();
        assert_eq!(err.kind(), "malformed_request");
    }
}
