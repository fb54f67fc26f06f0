/// Public read endpoints
use super::PageQuery;
use crate::{
    context::AppContext,
    error::KbResult,
    solution::{Category, Solution},
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/solutions", get(list_published))
        .route("/api/solutions/:id", get(get_published))
        .route("/api/categories", get(list_categories))
}

async fn list_published(
    State(ctx): State<AppContext>,
    Query(page): Query<PageQuery>,
) -> KbResult<Json<Vec<Solution>>> {
    let solutions = ctx
        .solutions
        .list_published(page.limit(), page.offset())
        .await?;
    Ok(Json(solutions))
}

async fn get_published(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> KbResult<Json<Solution>> {
    Ok(Json(ctx.solutions.get_published(&id).await?))
}

async fn list_categories(State(ctx): State<AppContext>) -> KbResult<Json<Vec<Category>>> {
    Ok(Json(ctx.solutions.list_categories().await?))
}
