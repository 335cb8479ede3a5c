use actix_web::{http::header, web, HttpResponse, ResponseError};
use futures::stream;
use serde::Deserialize;

use crate::config::Settings;
use crate::middleware::auth::Claims;
use crate::services::dashboard_service::{self, AdminDashboard, MapCenter, MapView, UserDashboard};
use crate::services::user_service;
use crate::store::{DataSource, Subscription};
use crate::utils::error::AppError;
use crate::utils::validation::validate_coordinates;

#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Stat cards and chart data", body = UserDashboard),
        (status = 302, description = "No session, redirected to login")
    )
)]
pub async fn user_dashboard(store: web::Data<dyn DataSource>) -> HttpResponse {
    match store.get_bins().await {
        Ok(snapshot) => HttpResponse::Ok().json(dashboard_service::user_dashboard(&snapshot)),
        Err(e) => {
            log::error!("❌ Failed to load dashboard: {}", e);
            e.error_response()
        }
    }
}

fn sse_event(view: &UserDashboard) -> Option<web::Bytes> {
    match serde_json::to_string(view) {
        Ok(payload) => Some(web::Bytes::from(format!("event: dashboard\ndata: {}\n\n", payload))),
        Err(e) => {
            log::error!("❌ Failed to encode dashboard event: {}", e);
            None
        }
    }
}

/// Pushes a recomputed dashboard for every bin snapshot.
/// The subscription lives inside the stream, so a closed connection releases it.
#[utoipa::path(
    get,
    path = "/dashboard/stream",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Server-sent `dashboard` events, one per bin snapshot", body = UserDashboard, content_type = "text/event-stream"),
        (status = 302, description = "No session, redirected to login")
    )
)]
pub async fn dashboard_stream(store: web::Data<dyn DataSource>, settings: web::Data<Settings>) -> HttpResponse {
    log::info!("📡 Dashboard stream opened");
    let first_wait = settings.store_timeout;
    let subscription = store.subscribe_bins();

    let events = stream::unfold((subscription, true), move |(mut subscription, first): (Subscription, bool)| async move {
        let next = if first {
            match tokio::time::timeout(first_wait, subscription.next()).await {
                Ok(snapshot) => snapshot,
                Err(_) => {
                    log::warn!("⏱️ No bin snapshot within {:?}, closing stream", first_wait);
                    None
                }
            }
        } else {
            subscription.next().await
        };

        let snapshot = next?;

        let event = sse_event(&dashboard_service::user_dashboard(&snapshot))?;
        Some((Ok::<_, actix_web::Error>(event), (subscription, false)))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(events)
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct MapQuery {
    /// Centre latitude, must be given together with `lng`
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl MapQuery {
    fn center(&self) -> Result<Option<MapCenter>, AppError> {
        match (self.lat, self.lng) {
            (None, None) => Ok(None),
            (Some(lat), Some(lng)) => {
                validate_coordinates(lat, lng)?;
                Ok(Some(MapCenter { lat, lng }))
            }
            _ => Err(AppError::Validation("lat and lng must be given together".to_string())),
        }
    }
}

#[utoipa::path(
    get,
    path = "/dashboard/map",
    tag = "Dashboard",
    params(MapQuery),
    responses(
        (status = 200, description = "Bin markers and map settings", body = MapView),
        (status = 400, description = "Invalid centre coordinates")
    )
)]
pub async fn map(
    store: web::Data<dyn DataSource>,
    settings: web::Data<Settings>,
    query: web::Query<MapQuery>,
) -> HttpResponse {
    let center = match query.center() {
        Ok(center) => center,
        Err(e) => return e.error_response(),
    };

    match store.get_bins().await {
        Ok(snapshot) => HttpResponse::Ok().json(dashboard_service::map_view(&snapshot, &settings.maps_api_key, center)),
        Err(e) => {
            log::error!("❌ Failed to load map: {}", e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "Admin",
    responses(
        (status = 200, description = "Bin table, summary and quarantined bins", body = AdminDashboard),
        (status = 302, description = "Not an admin session"),
        (status = 403, description = "Session user is no longer an admin")
    )
)]
pub async fn admin_dashboard(claims: web::ReqData<Claims>, store: web::Data<dyn DataSource>) -> HttpResponse {
    if let Err(e) = user_service::require_admin(store.get_ref(), &claims).await {
        return e.error_response();
    }

    match store.get_bins().await {
        Ok(snapshot) => {
            let view = dashboard_service::admin_dashboard(&snapshot);
            if !view.quarantined.is_empty() {
                log::warn!("⚠️ Admin dashboard: {} bins quarantined", view.quarantined.len());
            }
            HttpResponse::Ok().json(view)
        }
        Err(e) => {
            log::error!("❌ Failed to load admin dashboard: {}", e);
            e.error_response()
        }
    }
}
