/// Database layer for CrashKB
///
/// Manages the SQLite connection pool, embedded migrations, and the
/// timestamp encoding shared by every table.

pub mod account;

use crate::error::{KbError, KbResult};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> KbResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| KbError::Internal(format!("Failed to create {:?}: {}", parent, e)))?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> KbResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| KbError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> KbResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Encode a timestamp for storage.
///
/// Fixed-width UTC so that SQL string comparison orders chronologically.
pub fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp
pub fn decode_ts(raw: &str) -> KbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| KbError::Internal(format!("Invalid timestamp {:?}: {}", raw, e)))
}

/// Decode an optional stored timestamp
pub fn decode_opt_ts(raw: Option<String>) -> KbResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(decode_ts).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_timestamp_roundtrip_and_ordering() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = early + Duration::milliseconds(1500);

        let early_raw = encode_ts(early);
        let late_raw = encode_ts(late);

        assert_eq!(early_raw, "2024-01-02T03:04:05.000000Z");
        assert!(early_raw < late_raw);
        assert_eq!(decode_ts(&late_raw).unwrap(), late);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_ts("yesterday").is_err());
        assert_eq!(decode_opt_ts(None).unwrap(), None);
    }
}
