use actix_web::{web, HttpResponse, ResponseError};

use crate::middleware::auth::Claims;
use crate::models::{RoleUpdate, UserRecord};
use crate::services::user_service;
use crate::store::DataSource;

#[utoipa::path(
    get,
    path = "/dashboard/users",
    tag = "Users",
    responses(
        (status = 200, description = "`count` and `users`, every registered user"),
        (status = 302, description = "Not an admin session"),
        (status = 403, description = "Session user is not an admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(claims: web::ReqData<Claims>, store: web::Data<dyn DataSource>) -> HttpResponse {
    if let Err(e) = user_service::require_admin(store.get_ref(), &claims).await {
        return e.error_response();
    }

    match user_service::list_users(store.get_ref()).await {
        Ok(users) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "count": users.len(),
            "users": users
        })),
        Err(e) => {
            log::error!("❌ Failed to list users: {}", e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/dashboard/users/{id}/role",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "User with the new role", body = UserRecord),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Not an admin, or changing one's own role"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_role(
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    store: web::Data<dyn DataSource>,
    request: web::Json<RoleUpdate>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("👤 PATCH /dashboard/users/{}/role - role: {}", user_id, request.role);

    if let Err(e) = user_service::require_admin(store.get_ref(), &claims).await {
        return e.error_response();
    }

    match user_service::change_role(store.get_ref(), &claims, &user_id, &request).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": user
        })),
        Err(e) => {
            log::warn!("❌ Role change for {} failed: {}", user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/dashboard/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User and credentials deleted"),
        (status = 403, description = "Not an admin, or deleting one's own account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    store: web::Data<dyn DataSource>,
) -> HttpResponse {
    let user_id = path.into_inner();
    log::info!("🗑️ DELETE /dashboard/users/{}", user_id);

    if let Err(e) = user_service::require_admin(store.get_ref(), &claims).await {
        return e.error_response();
    }

    match user_service::delete_user(store.get_ref(), &claims, &user_id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "deleted": user_id
        })),
        Err(e) => {
            log::warn!("❌ Delete user {} failed: {}", user_id, e);
            e.error_response()
        }
    }
}
