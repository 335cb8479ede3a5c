// Service configuration, read once from the environment (.env is loaded in main)

use std::time::Duration;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MongoDb,
    Memory,
}

impl StoreBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreBackend::MongoDb => "mongodb",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub session_max_age_secs: i64,
    pub bcrypt_cost: u32,
    pub login_path: String,
    pub maps_api_key: String,
    pub store_timeout: Duration,
    pub poll_interval: Duration,
    pub allowed_origins: Vec<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup, so tests don't touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let store_backend = match get_or("STORE_BACKEND", "mongodb").to_lowercase().as_str() {
            "mongodb" | "mongo" => StoreBackend::MongoDb,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(AppError::Config(format!(
                    "STORE_BACKEND must be 'mongodb' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let database_url = get("DATABASE_URL");
        if store_backend == StoreBackend::MongoDb && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL must be set".to_string()));
        }

        let jwt_secret = get("JWT_SECRET").ok_or_else(|| AppError::Config("JWT_SECRET must be set".to_string()))?;

        let admin_email = get("ADMIN_EMAIL");
        let admin_password = get("ADMIN_PASSWORD");
        if admin_email.is_some() != admin_password.is_some() {
            return Err(AppError::Config(
                "ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string(),
            ));
        }

        Ok(Settings {
            host: get_or("HOST", "0.0.0.0"),
            port: parse_number(&get_or("PORT", "3002"), "PORT")?,
            store_backend,
            database_url,
            jwt_secret,
            jwt_issuer: get_or("JWT_ISSUER", "waste-dashboard"),
            jwt_audience: get_or("JWT_AUDIENCE", "waste-dashboard-web"),
            session_max_age_secs: parse_number(&get_or("SESSION_MAX_AGE_SECS", "3600"), "SESSION_MAX_AGE_SECS")?,
            bcrypt_cost: parse_number(&get_or("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string()), "BCRYPT_COST")?,
            login_path: get_or("LOGIN_PATH", "/login"),
            maps_api_key: get_or("MAPS_API_KEY", ""),
            store_timeout: Duration::from_secs(parse_number(&get_or("STORE_TIMEOUT_SECS", "10"), "STORE_TIMEOUT_SECS")?),
            poll_interval: Duration::from_secs(parse_number(&get_or("POLL_INTERVAL_SECS", "5"), "POLL_INTERVAL_SECS")?),
            allowed_origins: get_or("ALLOWED_ORIGINS", "http://localhost:3000")
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            admin_email,
            admin_password,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, AppError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    pub(crate) fn test_settings() -> Settings {
        settings_from(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", "test-secret"),
            ("BCRYPT_COST", "4"),
            ("MAPS_API_KEY", "maps-key"),
            ("STORE_TIMEOUT_SECS", "2"),
        ])
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = test_settings();
        assert_eq!(settings.port, 3002);
        assert_eq!(settings.session_max_age_secs, 3600);
        assert_eq!(settings.login_path, "/login");
        assert_eq!(settings.store_backend, StoreBackend::Memory);
        assert_eq!(settings.allowed_origins, vec!["http://localhost:3000".to_string()]);
        assert_eq!(settings.bind_address(), "0.0.0.0:3002");
    }

    #[test]
    fn test_mongodb_requires_database_url() {
        let result = settings_from(&[("JWT_SECRET", "s")]);
        assert!(matches!(result, Err(AppError::Config(_))));

        let ok = settings_from(&[("JWT_SECRET", "s"), ("DATABASE_URL", "mongodb://localhost/waste")]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_secret_is_required() {
        let result = settings_from(&[("STORE_BACKEND", "memory")]);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_bad_numbers_are_reported() {
        let result = settings_from(&[("STORE_BACKEND", "memory"), ("JWT_SECRET", "s"), ("PORT", "http")]);
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("PORT")));
    }

    #[test]
    fn test_admin_pair_must_be_complete() {
        let result = settings_from(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", "s"),
            ("ADMIN_EMAIL", "root@city.lk"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_origins_are_split() {
        let settings = settings_from(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", "s"),
            ("ALLOWED_ORIGINS", "http://a.lk, http://b.lk,"),
        ])
        .unwrap();
        assert_eq!(settings.allowed_origins, vec!["http://a.lk", "http://b.lk"]);
    }
}
