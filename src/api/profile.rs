use actix_web::{web, HttpResponse, ResponseError};

use crate::middleware::auth::Claims;
use crate::models::{ProfileUpdate, UserRecord};
use crate::services::user_service;
use crate::store::DataSource;

#[utoipa::path(
    get,
    path = "/dashboard/profile",
    tag = "Profile",
    responses(
        (status = 200, description = "Own profile", body = UserRecord)
    )
)]
pub async fn get_profile(claims: web::ReqData<Claims>, store: web::Data<dyn DataSource>) -> HttpResponse {
    match user_service::get_profile(store.get_ref(), &claims).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": user
        })),
        Err(e) => e.error_response(),
    }
}

#[utoipa::path(
    put,
    path = "/dashboard/profile",
    tag = "Profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile as stored after the update", body = UserRecord),
        (status = 400, description = "Invalid profile form")
    )
)]
pub async fn update_profile(
    claims: web::ReqData<Claims>,
    store: web::Data<dyn DataSource>,
    request: web::Json<ProfileUpdate>,
) -> HttpResponse {
    log::info!("✏️ PUT /dashboard/profile - user: {}", claims.sub);

    match user_service::update_profile(store.get_ref(), &claims, request.into_inner()).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": user
        })),
        Err(e) => {
            log::warn!("❌ Profile update failed for {}: {}", claims.sub, e);
            e.error_response()
        }
    }
}
