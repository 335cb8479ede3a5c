pub mod auth_service;
pub mod bin_aggregator;
pub mod bin_service;
pub mod dashboard_service;
pub mod user_service;
