// web-server/src/identity.rs
use async_trait::async_trait;
use common::models::identity::{derive_handle, UserIdentity, HANDLE_SUFFIX_LEN};
use common::{AuthError, WalletAddress};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityStoreError {
    #[error("handle already taken: {0}")]
    HandleTaken(String),
    #[error("no identity for address")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<IdentityStoreError> for AuthError {
    fn from(e: IdentityStoreError) -> Self {
        AuthError::IdentityResolution(e.to_string())
    }
}

/// Persistence boundary for user identities.
///
/// Implementations must enforce uniqueness of the canonical address and of
/// the handle at the storage level, since several processes may resolve the
/// same address at once.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_address(&self, address: &WalletAddress) -> Result<Option<UserIdentity>, IdentityStoreError>;

    /// Insert `identity` unless its address is already registered, in which
    /// case the stored identity is returned unchanged.
    async fn insert_if_absent(&self, identity: UserIdentity) -> Result<UserIdentity, IdentityStoreError>;

    /// Replace a user's handle (profile edit)
    async fn set_handle(&self, address: &WalletAddress, handle: &str) -> Result<UserIdentity, IdentityStoreError>;
}

/// In-process identity table
#[derive(Default)]
pub struct InMemoryIdentityStore {
    by_address: DashMap<WalletAddress, UserIdentity>,
    // Unique index: handle -> owner
    handles: DashMap<String, WalletAddress>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_by_address(&self, address: &WalletAddress) -> Result<Option<UserIdentity>, IdentityStoreError> {
        Ok(self.by_address.get(address).map(|entry| entry.value().clone()))
    }

    async fn insert_if_absent(&self, identity: UserIdentity) -> Result<UserIdentity, IdentityStoreError> {
        // Lock order: address entry, then handle entry
        match self.by_address.entry(identity.address.clone()) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => match self.handles.entry(identity.handle.clone()) {
                Entry::Occupied(_) => Err(IdentityStoreError::HandleTaken(identity.handle)),
                Entry::Vacant(handle_slot) => {
                    handle_slot.insert(identity.address.clone());
                    slot.insert(identity.clone());
                    Ok(identity)
                }
            },
        }
    }

    async fn set_handle(&self, address: &WalletAddress, handle: &str) -> Result<UserIdentity, IdentityStoreError> {
        let mut entry = self.by_address.get_mut(address).ok_or(IdentityStoreError::NotFound)?;
        let user = entry.value_mut();
        if user.handle == handle {
            return Ok(user.clone());
        }

        match self.handles.entry(handle.to_string()) {
            Entry::Occupied(_) => return Err(IdentityStoreError::HandleTaken(handle.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(address.clone());
            }
        }

        let previous = std::mem::replace(&mut user.handle, handle.to_string());
        let updated = user.clone();
        drop(entry);

        self.handles.remove(&previous);
        Ok(updated)
    }
}

/// Maps a verified wallet address to its application user, creating the
/// user on first sign-in
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    /// Find-or-create the user for `address`.
    ///
    /// An existing handle is never replaced. New users get the shortest free
    /// address-suffix handle.
    pub async fn resolve(&self, address: &WalletAddress) -> Result<UserIdentity, AuthError> {
        if let Some(existing) = self.store.find_by_address(address).await? {
            tracing::debug!("Resolved existing identity {} for {}", existing.id, address);
            return Ok(existing);
        }

        for suffix_len in (HANDLE_SUFFIX_LEN..=40).step_by(4) {
            let candidate = UserIdentity::new(address.clone(), derive_handle(address, suffix_len));
            let candidate_id = candidate.id;

            match self.store.insert_if_absent(candidate).await {
                Ok(identity) => {
                    if identity.id == candidate_id {
                        tracing::info!("Created identity {} with handle {} for {}", identity.id, identity.handle, address);
                    }
                    return Ok(identity);
                }
                Err(IdentityStoreError::HandleTaken(handle)) => {
                    tracing::debug!("Handle {} taken, trying a longer suffix", handle);
                }
                Err(e) => {
                    tracing::error!("Identity resolution failed for {}: {}", address, e);
                    return Err(e.into());
                }
            }
        }

        Err(AuthError::IdentityResolution(format!("no free handle for {}", address)))
    }
}
