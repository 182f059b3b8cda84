// common/src/address.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing a wallet address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,
    #[error("address must be 40 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("address contains non-hex characters")]
    InvalidHex,
    #[error("address does not match its EIP-55 checksum")]
    BadChecksum,
}

/// An Ethereum wallet address in canonical (lowercase) form.
///
/// Every lookup and join on addresses goes through this type, so two
/// differently-cased spellings of one wallet always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse any casing of a `0x`-prefixed address.
    ///
    /// Mixed-case input is treated as an EIP-55 checksummed address and must
    /// carry a correct checksum; all-lower or all-upper input is accepted as is.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let hex_part = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;

        if hex_part.len() != 40 {
            return Err(AddressError::InvalidLength(hex_part.len()));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidHex);
        }

        let address = Self(format!("0x{}", hex_part.to_ascii_lowercase()));

        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *hex_part {
            return Err(AddressError::BadChecksum);
        }

        Ok(address)
    }

    /// Build from the last 20 bytes of a public key hash
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// Canonical lowercase form, `0x` included
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex digits without the `0x` prefix
    pub fn hex_digits(&self) -> &str {
        &self.0[2..]
    }

    /// Raw 20 address bytes
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut bytes = [0u8; 20];
        // Construction guarantees exactly 40 hex digits
        let _ = hex::decode_to_slice(self.hex_digits(), &mut bytes);
        bytes
    }

    /// EIP-55 mixed-case checksum encoding
    pub fn to_checksum(&self) -> String {
        siwe::eip55(&self.to_bytes())
    }
}

/// Canonicalize a raw address string. Idempotent.
pub fn canonicalize(input: &str) -> Result<String, AddressError> {
    WalletAddress::parse(input).map(|a| a.0)
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference vectors from EIP-55
    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_vectors() {
        for expected in CHECKSUMMED {
            let address = WalletAddress::parse(&expected.to_lowercase()).unwrap();
            assert_eq!(address.to_checksum(), expected);
        }
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for raw in CHECKSUMMED {
            let once = canonicalize(raw).unwrap();
            let twice = canonicalize(&once).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once, raw.to_lowercase());
        }
    }

    #[test]
    fn test_case_variants_are_equal() {
        let checksummed = WalletAddress::parse(CHECKSUMMED[0]).unwrap();
        let lower = WalletAddress::parse(&CHECKSUMMED[0].to_lowercase()).unwrap();
        let upper = WalletAddress::parse(&format!("0x{}", CHECKSUMMED[0][2..].to_uppercase())).unwrap();
        assert_eq!(checksummed, lower);
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_rejects_bad_checksum() {
        // Flip the case of one letter
        let tampered = "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert_eq!(WalletAddress::parse(tampered), Err(AddressError::BadChecksum));
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(WalletAddress::parse("5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"), Err(AddressError::MissingPrefix));
        assert_eq!(WalletAddress::parse("0x1234"), Err(AddressError::InvalidLength(4)));
        assert_eq!(
            WalletAddress::parse("0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(AddressError::InvalidHex)
        );
    }

    #[test]
    fn test_bytes_round_trip() {
        let address = WalletAddress::parse(CHECKSUMMED[2]).unwrap();
        assert_eq!(WalletAddress::from_bytes(&address.to_bytes()), address);
    }
}
