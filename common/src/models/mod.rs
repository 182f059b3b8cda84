// common/src/models/mod.rs
pub mod identity;
pub mod nonce;
pub mod session;
