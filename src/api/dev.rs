/// Developer endpoints: solution review, application processing, role management
use super::PageQuery;
use crate::{
    admin::{AdminApplication, RejectApplicationRequest},
    auth::AuthContext,
    context::AppContext,
    db::account::AccountView,
    error::KbResult,
    solution::{Solution, SolutionChanges},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/dev/solutions/pending", get(list_pending_solutions))
        .route("/api/dev/solutions/:id", put(update_published))
        .route("/api/dev/solutions/:id/approve", post(approve_solution))
        .route("/api/dev/solutions/:id/reject", post(reject_solution))
        .route("/api/dev/applications", get(list_pending_applications))
        .route("/api/dev/applications/:id/approve", post(approve_application))
        .route("/api/dev/applications/:id/reject", post(reject_application))
        .route("/api/dev/users", get(list_users))
        .route(
            "/api/dev/users/:id/admin",
            post(promote_user).delete(demote_user),
        )
}

#[derive(Debug, Default, Deserialize)]
struct RejectSolutionRequest {
    #[serde(default)]
    reason: Option<String>,
}

async fn list_pending_solutions(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
) -> KbResult<Json<Vec<Solution>>> {
    let solutions = ctx
        .solutions
        .list_pending_review(&auth.principal, page.limit(), page.offset())
        .await?;
    Ok(Json(solutions))
}

async fn update_published(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(changes): Json<SolutionChanges>,
) -> KbResult<Json<Solution>> {
    Ok(Json(
        ctx.solutions
            .developer_update(&auth.principal, &id, changes)
            .await?,
    ))
}

async fn approve_solution(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> KbResult<Json<Solution>> {
    Ok(Json(ctx.solutions.approve(&auth.principal, &id).await?))
}

async fn reject_solution(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<String>,
    body: Option<Json<RejectSolutionRequest>>,
) -> KbResult<Json<Solution>> {
    // A bodiless reject falls back to the default note
    let Json(req) = body.unwrap_or_default();
    Ok(Json(
        ctx.solutions
            .reject(&auth.principal, &id, req.reason.as_deref())
            .await?,
    ))
}

async fn list_pending_applications(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
) -> KbResult<Json<Vec<AdminApplication>>> {
    let applications = ctx
        .elevation
        .list_pending(&auth.principal, page.limit(), page.offset())
        .await?;
    Ok(Json(applications))
}

async fn approve_application(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> KbResult<Json<AdminApplication>> {
    Ok(Json(ctx.elevation.approve(&auth.principal, id).await?))
}

async fn reject_application(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
    body: Option<Json<RejectApplicationRequest>>,
) -> KbResult<Json<AdminApplication>> {
    let Json(req) = body.unwrap_or_default();
    Ok(Json(
        ctx.elevation
            .reject(&auth.principal, id, req.feedback.as_deref())
            .await?,
    ))
}

async fn list_users(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(page): Query<PageQuery>,
) -> KbResult<Json<Vec<AccountView>>> {
    let accounts = ctx
        .role_admin
        .list_accounts(&auth.principal, page.limit(), page.offset())
        .await?;
    Ok(Json(accounts))
}

async fn promote_user(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> KbResult<Json<AccountView>> {
    Ok(Json(ctx.role_admin.promote_to_admin(&auth.principal, id).await?))
}

async fn demote_user(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> KbResult<Json<AccountView>> {
    Ok(Json(ctx.role_admin.revoke_admin(&auth.principal, id).await?))
}
