// common/src/challenge.rs
//! Sign-in challenges (EIP-4361 messages) bound to the server's origin.
//!
//! Message text is produced and parsed by the `siwe` crate. This module adds
//! what the server needs on top: the configured domain, origin and chain a
//! message must carry, and a strict parse that only accepts text equal to
//! its own canonical rendering.

use chrono::{DateTime, Utc};
use siwe::{Message, TimeStamp, Version};
use thiserror::Error;
use time::OffsetDateTime;
use url::Url;

use crate::address::{AddressError, WalletAddress};

/// Nonces are at least 8 alphanumeric characters
pub fn is_valid_nonce(nonce: &str) -> bool {
    nonce.len() >= 8 && nonce.chars().all(|c| c.is_ascii_alphanumeric())
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid sign-in message: {0}")]
    Parse(#[from] siwe::ParseError),
    #[error("sign-in message is not in canonical form")]
    NonCanonical,
}

/// Parse the exact text a wallet signed.
///
/// Rejects anything that would not re-render byte for byte, so the fields
/// checked are always those of the signed string.
pub fn parse_message(raw: &str) -> Result<Message, MessageError> {
    let message: Message = raw.parse()?;
    if message.to_string() != raw {
        return Err(MessageError::NonCanonical);
    }
    Ok(message)
}

/// Whether `message` is inside its `Not Before`/`Expiration Time` window at `at`
pub fn is_valid_at(message: &Message, at: DateTime<Utc>) -> bool {
    at.timestamp_nanos_opt()
        .and_then(|nanos| OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).ok())
        .map(|t| message.valid_at(&t))
        .unwrap_or(false)
}

/// Signer address of a parsed message
pub fn message_address(message: &Message) -> WalletAddress {
    WalletAddress::from_bytes(&message.address)
}

fn timestamp(at: DateTime<Utc>) -> Result<TimeStamp, ChallengeError> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map(TimeStamp::from)
        .map_err(|_| ChallengeError::InvalidTimestamp)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("domain {0} does not match the configured domain")]
    DomainMismatch(String),
    #[error("URI {0} does not match the configured origin")]
    UriMismatch(String),
    #[error("chain {0} does not match the configured chain")]
    ChainMismatch(u64),
    #[error("invalid nonce")]
    InvalidNonce,
    #[error("statement must be a single line")]
    InvalidStatement,
    #[error("timestamp out of range")]
    InvalidTimestamp,
}

/// Inputs for one sign-in challenge
#[derive(Debug, Clone)]
pub struct ChallengeRequest<'a> {
    pub address: &'a str,
    pub chain_id: u64,
    pub nonce: &'a str,
    pub domain: &'a str,
    pub uri: &'a str,
    pub statement: Option<&'a str>,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub resources: Vec<String>,
}

/// Builds sign-in messages bound to the server's configured origin.
///
/// `build` is pure: the caller supplies every timestamp, so identical
/// requests always render identical messages.
#[derive(Debug, Clone)]
pub struct ChallengeBuilder {
    domain: String,
    origin: Url,
    chain_id: u64,
}

impl ChallengeBuilder {
    pub fn new(domain: impl Into<String>, origin: Url, chain_id: u64) -> Self {
        Self {
            domain: domain.into(),
            origin,
            chain_id,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// True when `uri` is an absolute URL served from the configured origin
    pub fn matches_origin(&self, uri: &str) -> bool {
        Url::parse(uri)
            .map(|u| u.origin() == self.origin.origin())
            .unwrap_or(false)
    }

    /// Check a parsed message against the configured domain, origin and chain
    pub fn check(&self, message: &Message) -> Result<(), ChallengeError> {
        if message.domain.as_str() != self.domain {
            return Err(ChallengeError::DomainMismatch(message.domain.to_string()));
        }
        if !self.matches_origin(message.uri.as_str()) {
            return Err(ChallengeError::UriMismatch(message.uri.to_string()));
        }
        if message.chain_id != self.chain_id {
            return Err(ChallengeError::ChainMismatch(message.chain_id));
        }
        Ok(())
    }

    pub fn build(&self, request: ChallengeRequest<'_>) -> Result<Message, ChallengeError> {
        let address = WalletAddress::parse(request.address)?;

        if request.domain != self.domain {
            return Err(ChallengeError::DomainMismatch(request.domain.to_string()));
        }
        if !self.matches_origin(request.uri) {
            return Err(ChallengeError::UriMismatch(request.uri.to_string()));
        }
        if request.chain_id != self.chain_id {
            return Err(ChallengeError::ChainMismatch(request.chain_id));
        }
        if !is_valid_nonce(request.nonce) {
            return Err(ChallengeError::InvalidNonce);
        }
        if let Some(statement) = request.statement {
            if statement.is_empty() || statement.contains('\n') {
                return Err(ChallengeError::InvalidStatement);
            }
        }

        let resources = request
            .resources
            .iter()
            .map(|r| r.parse().map_err(|_| ChallengeError::UriMismatch(r.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Message {
            domain: request
                .domain
                .parse()
                .map_err(|_| ChallengeError::DomainMismatch(request.domain.to_string()))?,
            address: address.to_bytes(),
            statement: request.statement.map(str::to_string),
            uri: request
                .uri
                .parse()
                .map_err(|_| ChallengeError::UriMismatch(request.uri.to_string()))?,
            version: Version::V1,
            chain_id: request.chain_id,
            nonce: request.nonce.to_string(),
            issued_at: timestamp(request.issued_at)?,
            expiration_time: request.expiration_time.map(timestamp).transpose()?,
            not_before: request.not_before.map(timestamp).transpose()?,
            request_id: None,
            resources,
        })
    }
}
