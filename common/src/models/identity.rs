// common/src/models/identity.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::WalletAddress;

/// Number of trailing address hex digits in a generated handle
pub const HANDLE_SUFFIX_LEN: usize = 8;

/// Application user bound to exactly one wallet address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    pub address: WalletAddress,
    pub handle: String,
    pub created_at: DateTime<Utc>,
    // Profile fields belong to the CRUD layer
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

impl UserIdentity {
    pub fn new(address: WalletAddress, handle: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
            handle,
            created_at: Utc::now(),
            display_name: None,
            avatar_url: None,
            bio: None,
        }
    }
}

/// Handle derived from the address suffix. `suffix_len` grows only when a
/// shorter handle is already taken.
pub fn derive_handle(address: &WalletAddress, suffix_len: usize) -> String {
    let digits = address.hex_digits();
    let len = suffix_len.clamp(1, digits.len());
    format!("user_{}", &digits[digits.len() - len..])
}

/// View-safe projection of a user, exposed to the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub address: WalletAddress,
    pub handle: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&UserIdentity> for ProfileView {
    fn from(user: &UserIdentity) -> Self {
        Self {
            id: user.id,
            address: user.address.clone(),
            handle: user.handle.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            bio: user.bio.clone(),
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_deterministic_suffix() {
        let address = WalletAddress::parse("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        assert_eq!(derive_handle(&address, HANDLE_SUFFIX_LEN), "user_ef1beaed");
        assert_eq!(derive_handle(&address, HANDLE_SUFFIX_LEN), derive_handle(&address, HANDLE_SUFFIX_LEN));
        assert_eq!(derive_handle(&address, 12), "user_35e7ef1beaed");
    }
}
