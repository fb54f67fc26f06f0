/// HTTP adapters over the core services
///
/// Handlers only extract, delegate and serialize. All authorization and
/// workflow rules live in the services they call.
pub mod admin;
pub mod auth;
pub mod dev;
pub mod solutions;
pub mod users;

use crate::context::AppContext;
use axum::Router;
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(solutions::routes())
        .merge(admin::routes())
        .merge(dev::routes())
}

/// Limit/offset query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
