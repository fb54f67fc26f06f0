/// Session lifecycle endpoints
use crate::{
    account::{LoginRequest, RefreshRequest, RegisterRequest, SessionResponse},
    auth::AuthContext,
    context::AppContext,
    error::KbResult,
};
use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
}

async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> KbResult<Json<SessionResponse>> {
    let session = ctx
        .sessions
        .register(&req.username, &req.email, &req.password)
        .await?;
    Ok(Json(session))
}

async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> KbResult<Json<SessionResponse>> {
    let session = ctx.sessions.login(&req.username, &req.password).await?;
    Ok(Json(session))
}

async fn refresh(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshRequest>,
) -> KbResult<Json<SessionResponse>> {
    let session = ctx.sessions.refresh(&req.refresh_token).await?;
    Ok(Json(session))
}

async fn logout(State(ctx): State<AppContext>, auth: AuthContext) -> KbResult<Json<Value>> {
    ctx.sessions.logout(&auth.principal).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}
