use crate::middleware::auth::Claims;
use crate::models::{ProfileUpdate, Role, RoleUpdate, UserRecord};
use crate::services::auth_service;
use crate::store::DataSource;
use crate::utils::error::AppError;

/// Admin check against the stored role. The token's role can be stale after a demotion.
pub async fn require_admin(store: &dyn DataSource, acting: &Claims) -> Result<UserRecord, AppError> {
    let user = store
        .get_user(&acting.sub)
        .await?
        .ok_or_else(|| AppError::Auth("Session user no longer exists".to_string()))?;
    if user.role != Role::Admin {
        log::warn!("⛔ {} no longer holds the admin role", acting.sub);
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }
    Ok(user)
}

pub async fn list_users(store: &dyn DataSource) -> Result<Vec<UserRecord>, AppError> {
    store.list_users().await
}

pub async fn change_role(
    store: &dyn DataSource,
    acting: &Claims,
    user_id: &str,
    request: &RoleUpdate,
) -> Result<UserRecord, AppError> {
    let patch = request.validate()?;
    if acting.sub == user_id {
        return Err(AppError::Forbidden("You cannot change your own role".to_string()));
    }
    let user = store.update_user(user_id, &patch).await?;
    log::info!("✅ {} changed role of {} to {}", acting.sub, user_id, user.role.as_str());
    Ok(user)
}

pub async fn delete_user(store: &dyn DataSource, acting: &Claims, user_id: &str) -> Result<(), AppError> {
    if acting.sub == user_id {
        return Err(AppError::Forbidden("You cannot delete your own account here".to_string()));
    }
    store.delete_user(user_id).await?;
    log::info!("🗑️ {} deleted user {}", acting.sub, user_id);
    Ok(())
}

pub async fn get_profile(store: &dyn DataSource, claims: &Claims) -> Result<UserRecord, AppError> {
    auth_service::current_user(store, claims).await
}

pub async fn update_profile(
    store: &dyn DataSource,
    claims: &Claims,
    request: ProfileUpdate,
) -> Result<UserRecord, AppError> {
    let patch = request.validate()?;
    store.update_user(&claims.sub, &patch).await
}
