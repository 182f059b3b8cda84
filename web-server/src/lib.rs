// web-server/src/lib.rs
pub mod api;
pub mod identity;
pub mod middleware;
pub mod nonce_registry;
pub mod session_context;
pub mod session_issuer;
pub mod session_registry;
pub mod utils;
pub mod verifier;

use actix::{Actor, Addr};
use actix_web::web;
use common::challenge::ChallengeBuilder;
use common::{Config, ConfigError};
use std::sync::Arc;

use identity::{IdentityResolver, IdentityStore};
use nonce_registry::NonceRegistryActor;
use session_context::SessionContext;
use session_issuer::SessionIssuer;
use session_registry::SessionRegistryActor;
use verifier::SignatureVerifier;

/// Shared handles to the running auth components, cloned into every worker
#[derive(Clone)]
pub struct AppState {
    pub config: web::Data<Config>,
    pub nonces: web::Data<Addr<NonceRegistryActor>>,
    pub challenges: web::Data<ChallengeBuilder>,
    pub verifier: web::Data<SignatureVerifier>,
    pub issuer: web::Data<SessionIssuer>,
    pub context: web::Data<SessionContext>,
    pub resolver: web::Data<IdentityResolver>,
}

impl AppState {
    /// Validate `config` and start the registry actors. Must run inside an
    /// actix system.
    pub fn start(config: Config, store: Arc<dyn IdentityStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        let auth = &config.auth;
        let secret = auth.session_secret.as_bytes().to_vec();

        let challenges = ChallengeBuilder::new(auth.domain.clone(), auth.origin_url()?, auth.chain_id);

        let nonces = NonceRegistryActor::new()
            .with_ttl(auth.nonce_ttl_seconds)
            .start();
        let sessions = SessionRegistryActor::new().start();

        let resolver = Arc::new(IdentityResolver::new(store));
        let verifier = SignatureVerifier::new(challenges.clone(), nonces.clone());
        let issuer = SessionIssuer::new(
            secret.clone(),
            chrono::Duration::seconds(auth.session_ttl_seconds),
            sessions.clone(),
            resolver.clone(),
        );
        let context = SessionContext::new(secret, sessions);

        tracing::info!(
            "Sign-in configured for domain {} (origin {}, chain {})",
            auth.domain,
            auth.origin,
            auth.chain_id
        );

        Ok(Self {
            config: web::Data::new(config),
            nonces: web::Data::new(nonces),
            challenges: web::Data::new(challenges),
            verifier: web::Data::new(verifier),
            issuer: web::Data::new(issuer),
            context: web::Data::new(context),
            resolver: web::Data::from(resolver),
        })
    }

    /// Register shared state and all routes on an app
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.config.clone())
            .app_data(self.nonces.clone())
            .app_data(self.challenges.clone())
            .app_data(self.verifier.clone())
            .app_data(self.issuer.clone())
            .app_data(self.context.clone())
            .app_data(self.resolver.clone())
            .configure(api::configure);
    }
}
