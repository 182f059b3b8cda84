// web-server/src/verifier.rs
use actix::Addr;
use chrono::Utc;
use common::challenge::{is_valid_at, message_address, parse_message, ChallengeBuilder, ChallengeError};
use common::models::nonce::NonceCheck;
use common::models::session::VerifiedIdentity;
use common::signature::WalletSignature;
use common::AuthError;
use crate::nonce_registry::{BurnNonce, ConsumeNonce, NonceRegistryActor};

/// Checks a signed sign-in message against the server's configuration and
/// the nonce store. Every check must pass; there is no partial trust.
pub struct SignatureVerifier {
    challenges: ChallengeBuilder,
    nonces: Addr<NonceRegistryActor>,
}

impl SignatureVerifier {
    pub fn new(challenges: ChallengeBuilder, nonces: Addr<NonceRegistryActor>) -> Self {
        Self { challenges, nonces }
    }

    /// Verify `raw_message` signed with `signature` for the sign-in attempt
    /// `attempt_id`.
    ///
    /// Unparseable input is rejected before anything is consumed. A parsed
    /// message that fails a check burns its own nonce only. The nonce is
    /// consumed against the attempt last, and that success closes the
    /// attempt.
    pub async fn verify(
        &self,
        raw_message: &str,
        signature: &str,
        attempt_id: Option<String>,
    ) -> Result<VerifiedIdentity, AuthError> {
        let message = parse_message(raw_message).map_err(|e| {
            tracing::debug!("Rejecting unparseable sign-in message: {}", e);
            AuthError::from(e)
        })?;
        let signature = WalletSignature::from_hex(signature).map_err(|e| {
            tracing::debug!("Rejecting undecodable signature: {}", e);
            AuthError::from(e)
        })?;

        let claimed = message_address(&message);
        let now = Utc::now();

        if let Err(e) = self.check(&message, &signature, now) {
            self.nonces
                .send(BurnNonce {
                    candidate: message.nonce.clone(),
                })
                .await?;
            tracing::warn!("Sign-in rejected for {}: {}", claimed, e);
            return Err(e);
        }

        let nonce_check = self
            .nonces
            .send(ConsumeNonce {
                attempt_id,
                candidate: message.nonce.clone(),
            })
            .await?;

        match nonce_check {
            NonceCheck::Valid => {}
            NonceCheck::Expired => {
                tracing::warn!("Sign-in rejected: nonce expired for {}", claimed);
                return Err(AuthError::ExpiredChallenge("nonce expired".into()));
            }
            NonceCheck::Replayed => {
                tracing::warn!("Possible replay: unknown or used nonce presented by {}", claimed);
                return Err(AuthError::NonceReplay("nonce unknown or already used".into()));
            }
            NonceCheck::AttemptMismatch => {
                tracing::warn!("Possible replay: nonce from another sign-in attempt presented by {}", claimed);
                return Err(AuthError::NonceReplay("nonce issued to another attempt".into()));
            }
        }

        tracing::debug!("Verified sign-in for {}", claimed);
        Ok(VerifiedIdentity {
            address: claimed,
            chain_id: message.chain_id,
            verified_at: now,
        })
    }

    /// Checks that need no store: validity window, signer, then origin
    fn check(
        &self,
        message: &siwe::Message,
        signature: &WalletSignature,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if !is_valid_at(message, now) {
            return Err(AuthError::ExpiredChallenge("message outside its validity window".into()));
        }

        message
            .verify_eip191(signature.as_bytes())
            .map_err(|e| AuthError::SignatureInvalid(e.to_string()))?;

        self.challenges.check(message).map_err(|e| {
            match &e {
                ChallengeError::DomainMismatch(domain) => tracing::warn!(
                    "Possible phishing: message domain {} does not match {}",
                    domain,
                    self.challenges.domain()
                ),
                ChallengeError::UriMismatch(uri) => {
                    tracing::warn!("Possible phishing: message URI {} outside configured origin", uri)
                }
                _ => {}
            }
            AuthError::from(e)
        })
    }
}
