/// Endpoints acting on the caller's own account
use crate::{
    account::ChangePasswordRequest,
    admin::{AdminApplication, ApplyRequest},
    auth::AuthContext,
    context::AppContext,
    db::account::{AccountView, ProfileUpdate},
    error::KbResult,
};
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/users/me", get(get_me).put(update_me))
        .route("/api/users/me/password", put(change_password))
        .route(
            "/api/users/me/admin-application",
            get(my_application).post(apply_for_admin),
        )
}

async fn get_me(State(ctx): State<AppContext>, auth: AuthContext) -> KbResult<Json<AccountView>> {
    Ok(Json(ctx.sessions.current_user(&auth.principal).await?))
}

async fn update_me(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(update): Json<ProfileUpdate>,
) -> KbResult<Json<AccountView>> {
    Ok(Json(ctx.sessions.update_profile(&auth.principal, update).await?))
}

async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> KbResult<Json<Value>> {
    ctx.sessions
        .change_password(&auth.principal, &req.old_password, &req.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password changed, please log in again" })))
}

async fn my_application(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> KbResult<Json<AdminApplication>> {
    Ok(Json(ctx.elevation.my_application(&auth.principal).await?))
}

async fn apply_for_admin(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<ApplyRequest>,
) -> KbResult<Json<AdminApplication>> {
    Ok(Json(ctx.elevation.apply(&auth.principal, &req.reason).await?))
}
