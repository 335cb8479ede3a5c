mod api;
mod config;
mod database;
mod middleware;
mod models;
mod seeds;
mod services;
mod store;
mod utils;

use actix_cors::Cors;
use actix_web::{dev::Service, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use futures::FutureExt;
use std::io;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Settings, StoreBackend};
use crate::services::auth_service::Authenticator;
use crate::store::{BoundedStore, DataSource, MemoryStore};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables
    dotenv().ok();

    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env().map_err(|e| {
        log::error!("❌ Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("🚀 Starting Smart Waste Dashboard...");
    log::info!("🗄️ Store backend: {}", settings.store_backend.as_str());

    let backend: Arc<dyn DataSource> = match settings.store_backend {
        StoreBackend::MongoDb => {
            let url = settings.database_url.as_deref().unwrap_or_default();
            let db = database::MongoDB::new(url, settings.poll_interval)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("Failed to connect to MongoDB: {}", e)))?;
            log::info!("✅ MongoDB connected successfully");
            Arc::new(db)
        }
        StoreBackend::Memory => {
            log::warn!("⚠️ Using the in-memory store, nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
    };
    let store: Arc<dyn DataSource> = Arc::new(BoundedStore::new(backend, settings.store_timeout));
    let auth = Arc::new(Authenticator::from_settings(&settings));

    seeds::admin_seed::seed_admin(store.as_ref(), &auth, &settings).await;

    let bind_address = settings.bind_address();
    log::info!("🌐 Server starting on {}", bind_address);
    log::info!("📚 Swagger UI available at: http://{}/swagger-ui/", bind_address);
    log::info!("📄 OpenAPI spec at: http://{}/api-docs/openapi.json", bind_address);

    let store_data = web::Data::from(store);
    let auth_data = web::Data::from(auth.clone());
    let settings_data = web::Data::new(settings);

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CACHE_CONTROL,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);
        for origin in &settings_data.allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(store_data.clone())
            .app_data(auth_data.clone())
            .app_data(settings_data.clone())
            // innermost, so CORS preflights never hit the login redirect
            .wrap(middleware::SessionGate::new(auth.clone(), &settings_data.login_path))
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .wrap_fn(|req, srv| {
                srv.call(req).map(|res| {
                    match &res {
                        Ok(res) => api::metrics::record_response(res.status()),
                        Err(e) => api::metrics::record_response(e.as_response_error().status_code()),
                    }
                    res
                })
            })
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .configure(api::routes)
    })
    .bind(bind_address)?
    .run()
    .await
}
