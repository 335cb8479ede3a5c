use crate::config::Settings;
use crate::services::auth_service::{self, Authenticator};
use crate::store::DataSource;

/// Makes sure the account named by ADMIN_EMAIL exists and has the admin role.
/// Runs at startup. Failures are logged and the service keeps starting.
pub async fn seed_admin(store: &dyn DataSource, auth: &Authenticator, settings: &Settings) {
    let (email, password) = match (&settings.admin_email, &settings.admin_password) {
        (Some(email), Some(password)) => (email, password),
        _ => {
            log::info!("👤 Admin seed: ADMIN_EMAIL not set, skipping");
            return;
        }
    };

    match auth_service::ensure_admin(store, auth, email, password).await {
        Ok(admin) => log::info!("   ✅ Admin account ready: {} ({})", admin.email, admin.id),
        Err(e) => log::error!("   ❌ Failed to seed admin account {}: {}", email, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_settings;
    use crate::models::Role;
    use crate::services::auth_service::tests::test_authenticator;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        let auth = test_authenticator();
        let mut settings = test_settings();
        settings.admin_email = Some("Root@City.lk".to_string());
        settings.admin_password = Some("rootpass".to_string());

        seed_admin(&store, &auth, &settings).await;
        seed_admin(&store, &auth, &settings).await;

        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
        assert_eq!(users[0].email, "root@city.lk");
    }

    #[tokio::test]
    async fn test_no_admin_configured() {
        let store = MemoryStore::new();
        seed_admin(&store, &test_authenticator(), &test_settings()).await;
        assert!(store.list_users().await.unwrap().is_empty());
    }
}
