/// Background task implementations
use crate::{context::AppContext, db, error::KbResult, store::AccountRepository};
use chrono::Utc;

/// Null out refresh token pairs that expired without being used
pub async fn sweep_expired_refresh_grants(ctx: &AppContext) -> KbResult<u64> {
    ctx.store.clear_expired_refresh_grants(Utc::now()).await
}

/// Verify the database still answers
pub async fn health_check(ctx: &AppContext) -> KbResult<()> {
    db::test_connection(ctx.store.pool()).await
}
