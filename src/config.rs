/// Configuration management for the CrashKB backend
use crate::error::{KbError, KbResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Process-wide HMAC secret for access and refresh tokens
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// Accounts granted the developer role at startup (comma-separated in env)
    pub developer_usernames: Vec<String>,
}

/// Background job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub token_sweep_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> KbResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("KB_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("KB_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| KbError::Validation("Invalid port number".to_string()))?;
        let version = env!("CARGO_PKG_VERSION").to_string();

        let database_path = env::var("KB_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/crashkb.sqlite"));
        let max_connections = env::var("KB_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let jwt_secret = env::var("KB_JWT_SECRET")
            .map_err(|_| KbError::Validation("JWT secret required".to_string()))?;
        let access_token_ttl_secs = env::var("KB_ACCESS_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .map_err(|_| KbError::Validation("Invalid access token TTL".to_string()))?;
        let refresh_token_ttl_secs = env::var("KB_REFRESH_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "604800".to_string())
            .parse()
            .map_err(|_| KbError::Validation("Invalid refresh token TTL".to_string()))?;

        let developer_usernames = parse_list(&env::var("KB_DEVELOPER_USERNAMES").unwrap_or_default());

        let token_sweep_interval_secs = env::var("KB_TOKEN_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                database_path,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                access_token_ttl_secs,
                refresh_token_ttl_secs,
                developer_usernames,
            },
            jobs: JobsConfig {
                token_sweep_interval_secs,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> KbResult<()> {
        if self.service.hostname.is_empty() {
            return Err(KbError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(KbError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        let auth = &self.authentication;
        if auth.access_token_ttl_secs <= 0 || auth.refresh_token_ttl_secs <= 0 {
            return Err(KbError::Validation("Token TTLs must be positive".to_string()));
        }

        if auth.access_token_ttl_secs >= auth.refresh_token_ttl_secs {
            return Err(KbError::Validation(
                "Access token TTL must be shorter than refresh token TTL".to_string(),
            ));
        }

        if self.jobs.token_sweep_interval_secs == 0 {
            return Err(KbError::Validation(
                "Token sweep interval must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8080,
                version: "test".to_string(),
            },
            storage: StorageConfig {
                database_path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            authentication: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                access_token_ttl_secs: 900,
                refresh_token_ttl_secs: 86400,
                developer_usernames: vec![],
            },
            jobs: JobsConfig {
                token_sweep_interval_secs: 3600,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = sample();
        config.authentication.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(KbError::Validation(_))));
    }

    #[test]
    fn test_access_ttl_must_be_shorter() {
        let mut config = sample();
        config.authentication.access_token_ttl_secs = 86400;
        assert!(config.validate().is_err());

        config.authentication.access_token_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(parse_list(" dev1, ,dev2,"), vec!["dev1", "dev2"]);
        assert!(parse_list("").is_empty());
    }
}
