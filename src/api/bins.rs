use actix_web::{web, HttpResponse, ResponseError};

use crate::middleware::auth::Claims;
use crate::models::BinPatch;
use crate::services::dashboard_service::BinRow;
use crate::services::{bin_service, dashboard_service, user_service};
use crate::store::DataSource;

#[utoipa::path(
    patch,
    path = "/admin/dashboard/bins/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Bin id")),
    request_body = BinPatch,
    responses(
        (status = 200, description = "Updated bin row, status recomputed from level", body = BinRow),
        (status = 400, description = "Invalid level, location or coordinates"),
        (status = 403, description = "Session user is not an admin"),
        (status = 404, description = "Bin not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_bin(
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    store: web::Data<dyn DataSource>,
    request: web::Json<BinPatch>,
) -> HttpResponse {
    let bin_id = path.into_inner();
    log::info!("✏️ PATCH /admin/dashboard/bins/{}", bin_id);

    if let Err(e) = user_service::require_admin(store.get_ref(), &claims).await {
        return e.error_response();
    }

    match bin_service::update_bin(store.get_ref(), &bin_id, request.into_inner()).await {
        Ok(bin) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "bin": dashboard_service::bin_row(&bin)
        })),
        Err(e) => {
            log::warn!("❌ Update bin {} failed: {}", bin_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/admin/dashboard/bins/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Bin id")),
    responses(
        (status = 200, description = "Bin deleted"),
        (status = 403, description = "Session user is not an admin"),
        (status = 404, description = "Bin not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_bin(
    claims: web::ReqData<Claims>,
    path: web::Path<String>,
    store: web::Data<dyn DataSource>,
) -> HttpResponse {
    let bin_id = path.into_inner();
    log::info!("🗑️ DELETE /admin/dashboard/bins/{}", bin_id);

    if let Err(e) = user_service::require_admin(store.get_ref(), &claims).await {
        return e.error_response();
    }

    match bin_service::delete_bin(store.get_ref(), &bin_id).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "deleted": bin_id
        })),
        Err(e) => {
            log::warn!("❌ Delete bin {} failed: {}", bin_id, e);
            e.error_response()
        }
    }
}
