//! Data source adapter: the only way the service touches bins and users.
//!
//! Handlers receive an `Arc<dyn DataSource>` through `web::Data`, so the
//! MongoDB backend and the in-memory backend are interchangeable.

pub mod memory;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::models::{BinRecord, BinSnapshot, BinUpdate, Identity, UserPatch, UserRecord};
use crate::utils::error::AppError;

pub use memory::MemoryStore;

pub const BINS_COLLECTION: &str = "wasteBins";
pub const USERS_COLLECTION: &str = "users";
pub const CREDENTIALS_COLLECTION: &str = "credentials";

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Live view of the bin collection. Released when the handle is dropped.
    fn subscribe_bins(&self) -> Subscription;

    async fn get_bins(&self) -> Result<BinSnapshot, AppError>;

    /// Overwrites the given fields and returns the bin as stored afterwards.
    /// `status` is rewritten whenever `level` changes.
    async fn update_bin(&self, id: &str, update: &BinUpdate) -> Result<BinRecord, AppError>;

    async fn delete_bin(&self, id: &str) -> Result<(), AppError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError>;

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, AppError>;

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<UserRecord, AppError>;

    /// Removes the profile and its login identity
    async fn delete_user(&self, id: &str) -> Result<(), AppError>;

    async fn find_identity(&self, email: &str) -> Result<Option<Identity>, AppError>;

    /// Creates identity and profile together. Fails with `Conflict` if the
    /// email is taken.
    async fn create_account(&self, identity: Identity, profile: UserRecord) -> Result<UserRecord, AppError>;
}

/// Handle on a live bin listener.
///
/// `next()` yields the current snapshot as soon as one is available, then one
/// snapshot per change. Dropping the handle stops the backend watcher.
pub struct Subscription {
    rx: watch::Receiver<Option<BinSnapshot>>,
    watcher: Option<AbortHandle>,
}

impl Subscription {
    pub fn new(mut rx: watch::Receiver<Option<BinSnapshot>>) -> Self {
        rx.mark_changed();
        Self { rx, watcher: None }
    }

    pub fn with_watcher(rx: watch::Receiver<Option<BinSnapshot>>, watcher: AbortHandle) -> Self {
        let mut subscription = Self::new(rx);
        subscription.watcher = Some(watcher);
        subscription
    }

    /// `None` once the source has gone away
    pub async fn next(&mut self) -> Option<BinSnapshot> {
        loop {
            if self.rx.changed().await.is_err() {
                return None;
            }
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

pub async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            log::error!("⏱️ {} timed out after {:?}", operation, limit);
            Err(AppError::Timeout(format!("{} did not complete within {:?}", operation, limit)))
        }
    }
}

/// Wraps a backend so every call gives up after `limit`
pub struct BoundedStore {
    inner: Arc<dyn DataSource>,
    limit: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn DataSource>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl DataSource for BoundedStore {
    fn subscribe_bins(&self) -> Subscription {
        self.inner.subscribe_bins()
    }

    async fn get_bins(&self) -> Result<BinSnapshot, AppError> {
        bounded(self.limit, "Loading bins", self.inner.get_bins()).await
    }

    async fn update_bin(&self, id: &str, update: &BinUpdate) -> Result<BinRecord, AppError> {
        bounded(self.limit, "Updating bin", self.inner.update_bin(id, update)).await
    }

    async fn delete_bin(&self, id: &str) -> Result<(), AppError> {
        bounded(self.limit, "Deleting bin", self.inner.delete_bin(id)).await
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, AppError> {
        bounded(self.limit, "Listing users", self.inner.list_users()).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, AppError> {
        bounded(self.limit, "Loading user", self.inner.get_user(id)).await
    }

    async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<UserRecord, AppError> {
        bounded(self.limit, "Updating user", self.inner.update_user(id, patch)).await
    }

    async fn delete_user(&self, id: &str) -> Result<(), AppError> {
        bounded(self.limit, "Deleting user", self.inner.delete_user(id)).await
    }

    async fn find_identity(&self, email: &str) -> Result<Option<Identity>, AppError> {
        bounded(self.limit, "Looking up identity", self.inner.find_identity(email)).await
    }

    async fn create_account(&self, identity: Identity, profile: UserRecord) -> Result<UserRecord, AppError> {
        bounded(self.limit, "Creating account", self.inner.create_account(identity, profile)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<(), AppError> = bounded(Duration::from_millis(10), "Slow call", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let result = bounded(Duration::from_secs(1), "Fast call", async { Ok::<_, AppError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_subscription_skips_loading_state() {
        let (tx, rx) = watch::channel(None);
        let mut sub = Subscription::new(rx);

        let waiter = tokio::spawn(async move { sub.next().await });
        tx.send(Some(BinSnapshot::default())).unwrap();

        let first = waiter.await.unwrap();
        assert_eq!(first, Some(BinSnapshot::default()));
    }

    #[tokio::test]
    async fn test_subscription_ends_when_source_closes() {
        let (tx, rx) = watch::channel(Some(BinSnapshot::default()));
        let mut sub = Subscription::new(rx);
        assert!(sub.next().await.is_some());
        drop(tx);
        assert!(sub.next().await.is_none());
    }
}
