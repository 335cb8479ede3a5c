use actix_web::{http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static REDIRECT_COUNT: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);

/// Counts one finished request by its response status
pub fn record_response(status: StatusCode) {
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
    if status.is_redirection() {
        REDIRECT_COUNT.fetch_add(1, Ordering::Relaxed);
    } else if status.is_client_error() || status.is_server_error() {
        ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub http_requests_total: u64,
    pub http_redirects_total: u64,
    pub http_errors_total: u64,
}

fn render() -> String {
    format!(
        "# HELP http_requests_total Total number of HTTP requests\n\
         # TYPE http_requests_total counter\n\
         http_requests_total {}\n\
         \n\
         # HELP http_redirects_total Requests answered with a redirect (login or role gate)\n\
         # TYPE http_redirects_total counter\n\
         http_redirects_total {}\n\
         \n\
         # HELP http_errors_total Requests answered with a 4xx or 5xx status\n\
         # TYPE http_errors_total counter\n\
         http_errors_total {}\n",
        REQUEST_COUNT.load(Ordering::Relaxed),
        REDIRECT_COUNT.load(Ordering::Relaxed),
        ERROR_COUNT.load(Ordering::Relaxed),
    )
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Prometheus text counters", body = MetricsResponse)
    )
)]
pub async fn get_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(render())
}
