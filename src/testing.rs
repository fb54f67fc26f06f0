/// Shared fixtures for unit tests
use crate::{db, store::SqliteStore, token::TokenService};
use chrono::Duration;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

pub const TEST_SECRET: &str = "unit-test-secret-at-least-32-characters";

/// Fresh in-memory database with migrations applied.
///
/// One connection, since every connection to `:memory:` is its own database.
pub async fn memory_store() -> SqliteStore {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("open in-memory database");

    db::run_migrations(&pool).await.expect("apply migrations");

    SqliteStore::new(pool)
}

pub fn test_tokens() -> TokenService {
    TokenService::new(TEST_SECRET, Duration::minutes(15), Duration::days(7))
}
