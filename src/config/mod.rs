//! Configuration loaded once at startup from environment variables.
//!
//! Nothing in the service reads the environment after this point; the
//! resulting struct is handed to constructors explicitly.

use jsonwebtoken::Algorithm;
use secrecy::{ExposeSecret, Secret};
use std::env;
use std::str::FromStr;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub algorithm: Algorithm,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

impl Config {
    /// Load configuration from the environment, after `.env` if present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let host = get_env("HOST", Some("0.0.0.0"))?;
        let port = get_env("PORT", Some("8080"))?
            .parse::<u16>()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid PORT: {}", e)))?;
        let allowed_origins = get_env("ALLOWED_ORIGINS", Some("*"))?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = get_env("DATABASE_URL", None)?;
        let max_connections = get_env("DATABASE_MAX_CONNECTIONS", Some("10"))?
            .parse::<u32>()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid DATABASE_MAX_CONNECTIONS: {}", e))
            })?;
        let min_connections = get_env("DATABASE_MIN_CONNECTIONS", Some("1"))?
            .parse::<u32>()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid DATABASE_MIN_CONNECTIONS: {}", e))
            })?;

        let jwt_secret = get_env("JWT_SECRET_KEY", None)?;
        let algorithm = get_env("JWT_ALGORITHM", Some("HS256"))?;
        let algorithm = Algorithm::from_str(&algorithm).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid JWT_ALGORITHM: {}", e))
        })?;
        let access_token_expiry_minutes = get_env("ACCESS_TOKEN_EXPIRE_MINUTES", Some("15"))?
            .parse::<i64>()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid ACCESS_TOKEN_EXPIRE_MINUTES: {}", e))
            })?;
        let refresh_token_expiry_days = get_env("REFRESH_TOKEN_EXPIRE_DAYS", Some("7"))?
            .parse::<i64>()
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid REFRESH_TOKEN_EXPIRE_DAYS: {}", e))
            })?;

        let config = Config {
            service_name: "identity-service".to_string(),
            server: ServerConfig {
                host,
                port,
                allowed_origins,
            },
            database: DatabaseConfig {
                url: Secret::new(database_url),
                max_connections,
                min_connections,
            },
            jwt: JwtConfig {
                secret: Secret::new(jwt_secret),
                algorithm,
                access_token_expiry_minutes,
                refresh_token_expiry_days,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a working service.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt.secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET_KEY must not be empty"
            )));
        }
        if !matches!(
            self.jwt.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ALGORITHM must be an HMAC algorithm (HS256, HS384 or HS512)"
            )));
        }
        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACCESS_TOKEN_EXPIRE_MINUTES must be positive"
            )));
        }
        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REFRESH_TOKEN_EXPIRE_DAYS must be positive"
            )));
        }
        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MAX_CONNECTIONS must be positive"
            )));
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}
