use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Testing,
    Localhost,
    Development,
    Staging,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Result<Self, AppError> {
        match raw {
            "testing" => Ok(AppEnv::Testing),
            "localhost" => Ok(AppEnv::Localhost),
            "development" => Ok(AppEnv::Development),
            "staging" => Ok(AppEnv::Staging),
            "production" => Ok(AppEnv::Production),
            other => Err(AppError::Internal(format!(
                "APP_ENV = {other} is not registered"
            ))),
        }
    }

    pub fn json_logs(&self) -> bool {
        !matches!(self, AppEnv::Testing | AppEnv::Localhost)
    }

    pub fn default_log_level(&self) -> &'static str {
        if self.json_logs() { "info" } else { "debug" }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DistanceBackend {
    Google { api_key: String, timeout: Duration },
    Haversine { max_km: f64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub app_env: AppEnv,
    pub log_level: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub distance: DistanceBackend,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_env = AppEnv::parse(&lookup("APP_ENV").unwrap_or_else(|| "localhost".to_string()))?;

        let distance = match lookup("DISTANCE_BACKEND").as_deref().unwrap_or("google") {
            "google" => DistanceBackend::Google {
                api_key: lookup("GOOGLE_API_KEY")
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| AppError::Internal("GOOGLE_API_KEY is required".to_string()))?,
                timeout: Duration::from_millis(parse_or_default(
                    &lookup,
                    "DISTANCE_TIMEOUT_MS",
                    5_000u64,
                )?),
            },
            "haversine" => {
                let max_km: f64 = parse_or_default(&lookup, "HAVERSINE_MAX_KM", 1_000.0)?;
                if !max_km.is_finite() || max_km <= 0.0 {
                    return Err(AppError::Internal(format!(
                        "invalid HAVERSINE_MAX_KM: {max_km}, expected a positive number"
                    )));
                }
                DistanceBackend::Haversine { max_km }
            }
            other => {
                return Err(AppError::Internal(format!(
                    "invalid DISTANCE_BACKEND: {other}, expected google or haversine"
                )));
            }
        };

        let db_max_connections = parse_or_default(&lookup, "DB_MAX_CONNECTIONS", 5)?;
        if db_max_connections == 0 {
            return Err(AppError::Internal(
                "invalid DB_MAX_CONNECTIONS: 0, expected at least 1".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 8080)?,
            app_env,
            log_level: lookup("LOG_LEVEL")
                .unwrap_or_else(|| app_env.default_log_level().to_string()),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://orders.db?mode=rwc".to_string()),
            db_max_connections,
            db_acquire_timeout: Duration::from_millis(parse_or_default(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_MS",
                5_000u64,
            )?),
            distance,
        })
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}
