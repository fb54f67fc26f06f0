/// Author endpoints for admin-role accounts, plus session revocation
use crate::{
    auth::AuthContext,
    context::AppContext,
    error::KbResult,
    solution::{Solution, SolutionChanges, SolutionDraft, SolutionStatus},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/admin/solutions",
            get(list_mine).post(create_solution),
        )
        .route(
            "/api/admin/solutions/:id",
            get(get_solution)
                .put(update_solution)
                .delete(delete_solution),
        )
        .route("/api/admin/solutions/:id/submit", post(submit_solution))
        .route("/api/admin/solutions/:id/withdraw", post(withdraw_solution))
        .route("/api/admin/sessions/:username/revoke", post(revoke_session))
}

#[derive(Debug, Deserialize)]
struct ListMineQuery {
    status: Option<SolutionStatus>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_mine(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<ListMineQuery>,
) -> KbResult<Json<Vec<Solution>>> {
    let page = super::PageQuery {
        limit: query.limit,
        offset: query.offset,
    };
    let solutions = ctx
        .solutions
        .list_mine(&auth.principal, query.status, page.limit(), page.offset())
        .await?;
    Ok(Json(solutions))
}

async fn create_solution(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(draft): Json<SolutionDraft>,
) -> KbResult<Json<Solution>> {
    Ok(Json(ctx.solutions.create(&auth.principal, draft).await?))
}

async fn get_solution(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KbResult<Json<Solution>> {
    Ok(Json(ctx.solutions.get(&auth.principal, &id).await?))
}

async fn update_solution(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(changes): Json<SolutionChanges>,
) -> KbResult<Json<Solution>> {
    Ok(Json(ctx.solutions.update(&auth.principal, &id, changes).await?))
}

async fn delete_solution(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KbResult<Json<Value>> {
    ctx.solutions.delete(&auth.principal, &id).await?;
    Ok(Json(json!({ "message": "Solution deleted" })))
}

async fn submit_solution(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KbResult<Json<Solution>> {
    Ok(Json(ctx.solutions.submit(&auth.principal, &id).await?))
}

async fn withdraw_solution(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KbResult<Json<Solution>> {
    Ok(Json(ctx.solutions.withdraw(&auth.principal, &id).await?))
}

async fn revoke_session(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(username): Path<String>,
) -> KbResult<Json<Value>> {
    ctx.sessions.revoke(&auth.principal, &username).await?;
    Ok(Json(json!({ "message": format!("Session of {} revoked", username) })))
}
