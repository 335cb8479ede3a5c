pub mod auth;
pub mod bins;
pub mod dashboard;
pub mod health;
pub mod metrics;
pub mod profile;
pub mod swagger;
pub mod users;

use actix_web::web;

/// All application routes. Session checks for `/dashboard` and
/// `/admin/dashboard` happen in `SessionGate`, wrapped around the whole app.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(metrics::get_metrics))
        .service(
            web::scope("/api/v1/auth")
                .route("/login", web::post().to(auth::login))
                .route("/signup", web::post().to(auth::signup))
                .route("/logout", web::post().to(auth::logout))
                .route("/me", web::get().to(auth::me)),
        )
        .service(
            web::scope("/dashboard")
                .route("", web::get().to(dashboard::user_dashboard))
                .route("/stream", web::get().to(dashboard::dashboard_stream))
                .route("/map", web::get().to(dashboard::map))
                .route("/profile", web::get().to(profile::get_profile))
                .route("/profile", web::put().to(profile::update_profile))
                // admin only, enforced by the gate and again in each handler
                .route("/users", web::get().to(users::list_users))
                .route("/users/{id}/role", web::patch().to(users::change_role))
                .route("/users/{id}", web::delete().to(users::delete_user)),
        )
        .service(
            web::scope("/admin/dashboard")
                .route("", web::get().to(dashboard::admin_dashboard))
                .route("/bins/{id}", web::patch().to(bins::update_bin))
                .route("/bins/{id}", web::delete().to(bins::delete_bin)),
        );
}
