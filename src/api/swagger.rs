use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Smart Waste Dashboard API",
        version = "1.0.0",
        description = "Bin fill levels, maps and user management for the smart waste dashboard.\n\n**Sessions:** login and signup set the `authToken` and `userId` cookies. Pages under `/dashboard` and `/admin/dashboard` redirect to the login page without them.\n\n**Tiers:** Full 75-100%, Half-Full 40-74%, Low 0-39%.",
        contact(
            name = "Smart Waste Team",
            email = "support@smartwaste.lk"
        )
    ),
    paths(
        crate::api::auth::login,
        crate::api::auth::signup,
        crate::api::auth::logout,
        crate::api::auth::me,

        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        crate::api::dashboard::user_dashboard,
        crate::api::dashboard::dashboard_stream,
        crate::api::dashboard::map,
        crate::api::dashboard::admin_dashboard,

        crate::api::bins::update_bin,
        crate::api::bins::delete_bin,

        crate::api::profile::get_profile,
        crate::api::profile::update_profile,

        crate::api::users::list_users,
        crate::api::users::change_role,
        crate::api::users::delete_user,
    ),
    components(
        schemas(
            crate::models::LoginRequest,
            crate::models::SignupRequest,
            crate::models::ProfileUpdate,
            crate::models::RoleUpdate,
            crate::models::BinPatch,
            crate::models::UserRecord,
            crate::models::Role,
            crate::models::Tier,
            crate::models::BinRecord,
            crate::models::QuarantinedBin,
            crate::services::auth_service::AuthResponse,

            crate::services::bin_aggregator::TierCounts,
            crate::services::dashboard_service::BinSummary,
            crate::services::dashboard_service::DoughnutChart,
            crate::services::dashboard_service::LocationLevel,
            crate::services::dashboard_service::UserDashboard,
            crate::services::dashboard_service::BinRow,
            crate::services::dashboard_service::AdminDashboard,
            crate::services::dashboard_service::MapCenter,
            crate::services::dashboard_service::MapMarker,
            crate::services::dashboard_service::MapView,

            crate::api::health::HealthResponse,
            crate::api::metrics::MetricsResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Login, signup and logout. Successful login and signup set the session cookies."),
        (name = "Health", description = "Health check and request counters."),
        (name = "Dashboard", description = "Bin summary, charts and map for any logged-in user."),
        (name = "Profile", description = "The logged-in user's own profile."),
        (name = "Users", description = "User list, role changes and account removal. Admin sessions only."),
        (name = "Admin", description = "Bin table and bin maintenance. Admin sessions only."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Same token as the authToken cookie"))
                        .build(),
                ),
            );
        }
    }
}
