use crate::models::{BinPatch, BinRecord};
use crate::store::DataSource;
use crate::utils::error::AppError;

/// Validates and applies an admin edit. Status is recomputed from the new level.
pub async fn update_bin(store: &dyn DataSource, bin_id: &str, patch: BinPatch) -> Result<BinRecord, AppError> {
    let update = patch.validate()?;
    let bin = store.update_bin(bin_id, &update).await?;
    log::info!("✅ Bin {} updated: level {}%, status {}", bin.id, bin.level, bin.status());
    Ok(bin)
}

pub async fn delete_bin(store: &dyn DataSource, bin_id: &str) -> Result<(), AppError> {
    store.delete_bin(bin_id).await?;
    log::info!("🗑️ Bin {} deleted", bin_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::with_bins(vec![BinRecord {
            id: "b1".to_string(),
            location: "Fort Station".to_string(),
            lat: 6.934,
            lng: 79.850,
            level: 20,
        }])
    }

    #[tokio::test]
    async fn test_level_change_recomputes_status() {
        let store = store();
        let patch = BinPatch {
            level: Some(76),
            ..Default::default()
        };
        let bin = update_bin(&store, "b1", patch).await.unwrap();
        assert_eq!(bin.status(), "Full");

        let snapshot = store.get_bins().await.unwrap();
        assert_eq!(snapshot.bins["b1"].level, 76);
    }

    #[tokio::test]
    async fn test_invalid_patch_never_reaches_store() {
        let store = store();
        let patch = BinPatch {
            level: Some(250),
            ..Default::default()
        };
        assert!(matches!(update_bin(&store, "b1", patch).await, Err(AppError::Validation(_))));
        assert_eq!(store.get_bins().await.unwrap().bins["b1"].level, 20);
    }

    #[tokio::test]
    async fn test_delete_bin() {
        let store = store();
        delete_bin(&store, "b1").await.unwrap();
        assert!(store.get_bins().await.unwrap().bins.is_empty());
        assert!(matches!(delete_bin(&store, "b1").await, Err(AppError::NotFound(_))));
    }
}
