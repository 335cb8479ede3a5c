// In-process DataSource. Backs the test suite and STORE_BACKEND=memory.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

use super::{DataSource, Subscription};
use crate::models::{BinRecord, BinSnapshot, BinUpdate, Identity, UserPatch, UserRecord};
use crate::utils::error::AppError;

pub struct MemoryStore {
    bins: watch::Sender<Option<BinSnapshot>>,
    users: RwLock<BTreeMap<String, UserRecord>>,
    // keyed by email
    identities: RwLock<HashMap<String, Identity>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (bins, _) = watch::channel(Some(BinSnapshot::default()));
        Self {
            bins,
            users: RwLock::new(BTreeMap::new()),
            identities: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_bins<I>(bins: I) -> Self
    where
        I: IntoIterator<Item = BinRecord>,
    {
        let store = Self::new();
        store.bins.send_replace(Some(BinSnapshot::from_records(bins)));
        store
    }

    /// Inserts or replaces a bin, as an external writer would
    #[cfg(test)]
    pub fn put_bin(&self, bin: BinRecord) {
        self.bins.send_modify(|snapshot| {
            snapshot
                .get_or_insert_with(BinSnapshot::default)
                .bins
                .insert(bin.id.clone(), bin);
        });
    }

    /// Number of live bin subscriptions
    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.bins.receiver_count()
    }

    fn users_read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, UserRecord>>, AppError> {
        self.users
            .read()
            .map_err(|_| AppError::DataFetch("user store lock poisoned".to_string()))
    }

    fn users_write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, UserRecord>>, AppError> {
        self.users
            .write()
            .map_err(|_| AppError::Mutation("user store lock poisoned".to_string()))
    }

    fn identities_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Identity>>, AppError> {
        self.identities
            .write()
            .map_err(|_| AppError::Mutation("identity store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DataSource for MemoryStore {
    fn subscribe_bins(&self) -> Subscription {
        Subscription::new(self.bins.subscribe())
    }

    async fn get_bins(&self) -> Result<BinSnapshot, AppError> {
        Ok(self.bins.borrow().clone().unwrap_or_default())
    }

    async fn update_bin(&self, id: &str, update: &BinUpdate) -> Result<BinRecord, AppError> {
        let mut updated = None;
        self.bins.send_if_modified(|snapshot| {
            let bin = snapshot.as_mut().and_then(|s| s.bins.get_mut(id));
            match bin {
                Some(bin) => {
                    update.apply(bin);
                    updated = Some(bin.clone());
                    true
                }
                None => false,
            }
        });
        updated.ok_or_else(|| AppError::NotFound(format!("Bin {}", id)))
    }

    async fn delete_bin(&self, id: &str) -> Result<(), AppError> {
        let removed = self.bins.send_if_modified(|snapshot| {
            snapshot
                .as_mut()
                .map(|s| s.bins.remove(id).is_some())
                .unwrap_or(false)
        });
        if removed {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Bin {}", id)))
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        Ok(self.users_read()?.values().cloned().collect())
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users_read()?.get(id).cloned())
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<UserRecord, AppError> {
        let mut users = self.users_write()?;
        let user = users
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;
        patch.apply(user);
        Ok(user.clone())
    }

    async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        let removed = self.users_write()?.remove(id);
        match removed {
            Some(user) => {
                self.identities_write()?.retain(|_, identity| identity.id != user.id);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("User {}", id))),
        }
    }

    async fn find_identity(&self, email: &str) -> Result<Option<Identity>, AppError> {
        let identities = self
            .identities
            .read()
            .map_err(|_| AppError::DataFetch("identity store lock poisoned".to_string()))?;
        Ok(identities.get(email).cloned())
    }

    async fn create_account(&self, identity: Identity, profile: UserRecord) -> Result<UserRecord, AppError> {
        let mut identities = self.identities_write()?;
        if identities.contains_key(&identity.email) {
            return Err(AppError::Conflict(format!("{} is already registered", identity.email)));
        }
        let mut users = self.users_write()?;
        users.insert(profile.id.clone(), profile.clone());
        identities.insert(identity.email.clone(), identity);
        Ok(profile)
    }
}
