//! Shared fixtures for integration tests
#![allow(dead_code)]

use crashkb::{
    admin::Role,
    auth::Principal,
    config::{AuthConfig, JobsConfig, LoggingConfig, ServerConfig, ServiceConfig, StorageConfig},
    context::AppContext,
    db,
    store::AccountRepository,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{path::Path, str::FromStr};

pub const PASSWORD: &str = "Passw0rd!";

pub fn test_config(database_path: &Path, max_connections: u32) -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
            version: "test".to_string(),
        },
        storage: StorageConfig {
            database_path: database_path.to_path_buf(),
            max_connections,
        },
        authentication: AuthConfig {
            jwt_secret: "integration-test-secret-0123456789abcdef".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 604_800,
            developer_usernames: vec![],
        },
        jobs: JobsConfig {
            token_sweep_interval_secs: 3600,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

/// Context over a single-connection in-memory database
pub async fn memory_context() -> AppContext {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    AppContext::with_pool(test_config(Path::new(":memory:"), 1), pool)
}

/// Context over a file database with several connections, for race tests.
///
/// Keep the returned directory alive for the duration of the test.
pub async fn file_context() -> (AppContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir.path().join("crashkb.sqlite"), 8);
    let ctx = AppContext::new(config).await.unwrap();
    (ctx, dir)
}

/// Register an account and return its principal
pub async fn register(ctx: &AppContext, username: &str) -> Principal {
    ctx.sessions
        .register(username, &format!("{}@x.com", username), PASSWORD)
        .await
        .unwrap();
    principal(ctx, username).await
}

/// Register an account holding `role` in addition to user
pub async fn register_with_role(ctx: &AppContext, username: &str, role: Role) -> Principal {
    let principal = register(ctx, username).await;
    ctx.store
        .grant_role(principal.account_id, role, Utc::now())
        .await
        .unwrap();
    self::principal(ctx, username).await
}

/// Reload the principal with its current roles
pub async fn principal(ctx: &AppContext, username: &str) -> Principal {
    let account = ctx
        .store
        .find_account_by_username(username)
        .await
        .unwrap()
        .unwrap();
    Principal::from(&account)
}
