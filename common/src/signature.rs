// common/src/signature.rs
use k256::ecdsa::{Signature, VerifyingKey};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use crate::address::WalletAddress;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature is not valid hex")]
    InvalidHex,
    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("invalid ECDSA signature")]
    InvalidSignature,
}

/// A 65-byte `r || s || v` wallet signature as produced by `personal_sign`
#[derive(Debug, Clone)]
pub struct WalletSignature([u8; 65]);

impl WalletSignature {
    /// Decode a hex signature, with or without `0x`.
    ///
    /// Accepts both raw (0/1) and legacy (27/28) recovery bytes.
    pub fn from_hex(input: &str) -> Result<Self, SignatureError> {
        let decoded = hex::decode(input.trim().trim_start_matches("0x"))
            .map_err(|_| SignatureError::InvalidHex)?;

        let bytes: [u8; 65] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| SignatureError::InvalidLength(decoded.len()))?;

        match bytes[64] {
            0 | 1 | 27 | 28 => {}
            other => return Err(SignatureError::InvalidRecoveryId(other)),
        }
        Signature::from_slice(&bytes[..64]).map_err(|_| SignatureError::InvalidSignature)?;

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }
}

/// Keccak-256 digest
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Ethereum address of a secp256k1 public key
pub fn address_of(key: &VerifyingKey) -> WalletAddress {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed marker
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    WalletAddress::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{ChallengeBuilder, ChallengeRequest};
    use chrono::Utc;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;
    use url::Url;

    fn message_for(key: &SigningKey, nonce: &str) -> siwe::Message {
        let address = address_of(key.verifying_key()).to_checksum();
        ChallengeBuilder::new("app.example", Url::parse("https://app.example").unwrap(), 1)
            .build(ChallengeRequest {
                address: &address,
                chain_id: 1,
                nonce,
                domain: "app.example",
                uri: "https://app.example/",
                statement: None,
                issued_at: Utc::now(),
                expiration_time: None,
                not_before: None,
                resources: Vec::new(),
            })
            .unwrap()
    }

    fn personal_sign(key: &SigningKey, message: &siwe::Message) -> String {
        let digest = message.eip191_hash().unwrap();
        let (signature, recovery_id) = key.sign_prehash_recoverable(&digest).unwrap();
        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(recovery_id.to_byte() + 27);
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn test_signature_verifies_for_signer() {
        let key = SigningKey::random(&mut OsRng);
        let message = message_for(&key, "abcdefgh1234");

        let signature = WalletSignature::from_hex(&personal_sign(&key, &message)).unwrap();
        assert!(message.verify_eip191(signature.as_bytes()).is_ok());
    }

    #[test]
    fn test_signature_fails_for_other_message() {
        let key = SigningKey::random(&mut OsRng);
        let signed = message_for(&key, "abcdefgh1234");
        let other = message_for(&key, "zyxwvuts9876");

        let signature = WalletSignature::from_hex(&personal_sign(&key, &signed)).unwrap();
        assert!(other.verify_eip191(signature.as_bytes()).is_err());
    }

    #[test]
    fn test_signature_fails_for_other_key() {
        let key = SigningKey::random(&mut OsRng);
        let message = message_for(&key, "abcdefgh1234");

        let signature = WalletSignature::from_hex(&personal_sign(&SigningKey::random(&mut OsRng), &message)).unwrap();
        assert!(message.verify_eip191(signature.as_bytes()).is_err());
    }

    #[test]
    fn test_known_private_key_address() {
        // Hardhat account #0
        let secret = hex::decode("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80").unwrap();
        let key = SigningKey::from_slice(&secret).unwrap();
        assert_eq!(
            address_of(key.verifying_key()).to_checksum(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_rejects_bad_encodings() {
        assert_eq!(WalletSignature::from_hex("0xnothex").unwrap_err(), SignatureError::InvalidHex);
        assert_eq!(WalletSignature::from_hex("0x1234").unwrap_err(), SignatureError::InvalidLength(2));

        let mut bytes = vec![1u8; 64];
        bytes.push(5);
        assert_eq!(
            WalletSignature::from_hex(&hex::encode(bytes)).unwrap_err(),
            SignatureError::InvalidRecoveryId(5)
        );

        let mut zeroes = vec![0u8; 64];
        zeroes.push(27);
        assert_eq!(
            WalletSignature::from_hex(&hex::encode(zeroes)).unwrap_err(),
            SignatureError::InvalidSignature
        );
    }
}
