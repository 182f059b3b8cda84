// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};
use thiserror::Error;
use url::Url;

/// Shortest accepted session signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Central configuration for the sign-in service
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web_server_addr: String,
    pub log_level: String,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC key for session tokens
    pub session_secret: String,
    /// Expected `domain` of sign-in messages, e.g. `app.example`
    pub domain: String,
    /// Expected origin of sign-in message URIs, e.g. `https://app.example`
    pub origin: String,
    pub chain_id: u64,
    pub statement: String,
    pub session_ttl_seconds: i64,
    pub nonce_ttl_seconds: i64,
    pub secure_cookies: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("session secret must be at least {MIN_SECRET_LEN} bytes")]
    SecretTooShort,
    #[error("origin must be an absolute http(s) URL: {0}")]
    InvalidOrigin(String),
    #[error("domain {domain} does not match origin authority {authority}")]
    DomainMismatch { domain: String, authority: String },
    #[error("{0} must be positive")]
    NonPositiveTtl(&'static str),
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            log_level: "info".to_string(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            domain: "localhost:8081".to_string(),
            origin: "http://localhost:8081".to_string(),
            chain_id: 1,
            statement: "Sign in with Ethereum to the app.".to_string(),
            session_ttl_seconds: 14 * 86400,
            nonce_ttl_seconds: 300,
            secure_cookies: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_seconds: 60,
        }
    }
}

impl AuthConfig {
    /// Parsed origin URL; only valid after [`Config::validate`]
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin).map_err(|_| ConfigError::InvalidOrigin(self.origin.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidOrigin(self.origin.clone()));
        }
        Ok(url)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // APP__AUTH__SESSION_SECRET and friends
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let defaults = Self::default();
                let auth_defaults = defaults.auth;

                let env_or = |key: &str, fallback: String| env::var(key).unwrap_or(fallback);
                let env_parse = |key: &str| env::var(key).ok().and_then(|v| v.parse::<i64>().ok());

                Self {
                    web_server_addr: env_or("WEB_SERVER_ADDR", defaults.web_server_addr),
                    log_level: env_or("LOG_LEVEL", defaults.log_level),
                    auth: AuthConfig {
                        session_secret: env_or("SESSION_SECRET", auth_defaults.session_secret),
                        domain: env_or("SIWE_DOMAIN", auth_defaults.domain),
                        origin: env_or("SIWE_ORIGIN", auth_defaults.origin),
                        chain_id: env::var("SIWE_CHAIN_ID")
                            .ok()
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(auth_defaults.chain_id),
                        statement: env_or("SIWE_STATEMENT", auth_defaults.statement),
                        session_ttl_seconds: env_parse("SESSION_TTL_SECONDS")
                            .unwrap_or(auth_defaults.session_ttl_seconds),
                        nonce_ttl_seconds: env_parse("NONCE_TTL_SECONDS")
                            .unwrap_or(auth_defaults.nonce_ttl_seconds),
                        secure_cookies: env::var("SECURE_COOKIES")
                            .map(|v| v.to_lowercase() == "true")
                            .unwrap_or(auth_defaults.secure_cookies),
                    },
                    rate_limit: defaults.rate_limit,
                }
            }
        }
    }

    /// Reject settings the service must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort);
        }

        let origin = self.auth.origin_url()?;
        let authority = match (origin.host_str(), origin.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ConfigError::InvalidOrigin(self.auth.origin.clone())),
        };
        if self.auth.domain != authority {
            return Err(ConfigError::DomainMismatch {
                domain: self.auth.domain.clone(),
                authority,
            });
        }

        if self.auth.session_ttl_seconds <= 0 {
            return Err(ConfigError::NonPositiveTtl("session_ttl_seconds"));
        }
        if self.auth.nonce_ttl_seconds <= 0 {
            return Err(ConfigError::NonPositiveTtl("nonce_ttl_seconds"));
        }

        Ok(())
    }
}
