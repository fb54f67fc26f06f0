/// Authorization gate: principal resolution, role checks and ownership checks
///
/// The principal is always passed explicitly into the workflows. The axum
/// extractor at the bottom of this module is the only place one is built
/// from request state.
use crate::{
    admin::{Role, RoleSet},
    context::AppContext,
    db::account::Account,
    error::{KbError, KbResult},
    store::AccountRepository,
    token::TokenService,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;

/// Authenticated identity attached to a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub account_id: i64,
    pub username: String,
    pub roles: RoleSet,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    /// Fail with `PermissionDenied` unless the principal holds `role`
    pub fn require(&self, role: Role) -> KbResult<()> {
        if self.has_role(role) {
            return Ok(());
        }

        tracing::warn!(username = %self.username, required = %role, "Role check failed");
        Err(KbError::PermissionDenied(format!("{} role required", role)))
    }

    /// Fail unless the principal holds at least one of `roles`
    pub fn require_any(&self, roles: &[Role]) -> KbResult<()> {
        if roles.iter().any(|r| self.has_role(*r)) {
            return Ok(());
        }

        let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        tracing::warn!(username = %self.username, required = ?names, "Role check failed");
        Err(KbError::PermissionDenied(format!(
            "one of [{}] roles required",
            names.join(", ")
        )))
    }
}

impl From<&Account> for Principal {
    fn from(account: &Account) -> Self {
        Principal {
            account_id: account.id,
            username: account.username.clone(),
            roles: account.roles,
        }
    }
}

/// Ownership is per resource and independent of role
pub fn require_owner(principal: &Principal, owner_id: i64, action: &str) -> KbResult<()> {
    if principal.account_id == owner_id {
        return Ok(());
    }

    tracing::warn!(
        username = %principal.username,
        owner_id,
        action,
        "Ownership check failed"
    );
    Err(KbError::PermissionDenied(format!(
        "only the creator may {}",
        action
    )))
}

/// Turns access tokens into principals
pub struct AuthorizationGate {
    tokens: Arc<TokenService>,
    accounts: Arc<dyn AccountRepository>,
}

impl AuthorizationGate {
    pub fn new(tokens: Arc<TokenService>, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { tokens, accounts }
    }

    /// Verify an access token and load the caller with a fresh role set
    pub async fn resolve(&self, access_token: &str) -> KbResult<Principal> {
        let username = self.tokens.verify_access_token(access_token)?;

        let account = self
            .accounts
            .find_account_by_username(&username)
            .await?
            .ok_or(KbError::UserNotFound)?;

        if !account.enabled {
            tracing::warn!(username = %account.username, "Disabled account presented a token");
            return Err(KbError::AccountDisabled);
        }

        Ok(Principal::from(&account))
    }
}

/// Extract a bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

/// Authenticated request context
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = KbError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(KbError::Unauthorized)?;
        let principal = state.gate.resolve(token).await?;

        Ok(AuthContext { principal })
    }
}
