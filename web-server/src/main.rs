// web-server/src/main.rs
use std::sync::Arc;
use std::time::Duration;
use actix_web::{App, HttpServer};
use common::{setup_tracing, with_bootstrap_tracing, Config};
use web_server::identity::InMemoryIdentityStore;
use web_server::middleware::rate_limiter::RateLimiter;
use web_server::AppState;

// Rate limiter bookkeeping sweep, in seconds
const LIMITER_SWEEP_INTERVAL: u64 = 300;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration, logging at info until the configured level applies
    let config = with_bootstrap_tracing(Config::from_env);

    // Setup tracing
    setup_tracing(&config.log_level);

    // Save address before moving config into the app state
    let server_addr = config.web_server_addr.clone();
    let limiter = RateLimiter::new(
        vec![
            "/auth/nonce".to_string(),
            "/auth/challenge".to_string(),
            "/auth/verify".to_string(),
        ],
        &config.rate_limit,
    );

    let state = AppState::start(config, Arc::new(InMemoryIdentityStore::new())).map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let sweeper = limiter.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(Duration::from_secs(LIMITER_SWEEP_INTERVAL));
        loop {
            interval.tick().await;
            let removed = sweeper.sweep();
            if removed > 0 {
                tracing::debug!("Rate limiter dropped {} idle clients", removed);
            }
        }
    });

    tracing::info!("Starting Web Server on {}", server_addr);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .wrap(limiter.clone())
            .configure(|cfg| state.configure(cfg))
    })
    .bind(&server_addr)?
    .run()
    .await
}
