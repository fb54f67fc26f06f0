/// Session manager
///
/// The stored refresh grant on the account row is the whole session state:
/// login overwrites it, refresh swaps it conditionally, logout and
/// revocation clear it.
use super::{
    password::{hash_password, verify_password},
    SessionResponse,
};
use crate::{
    admin::Role,
    auth::Principal,
    db::account::{Account, AccountView, NewAccount, ProfileUpdate, RefreshGrant},
    error::{KbError, KbResult},
    store::AccountRepository,
    token::TokenService,
};
use chrono::Utc;
use std::sync::Arc;

const MIN_PASSWORD_LEN: usize = 8;

/// Session lifecycle service
pub struct SessionManager {
    accounts: Arc<dyn AccountRepository>,
    tokens: Arc<TokenService>,
}

impl SessionManager {
    pub fn new(accounts: Arc<dyn AccountRepository>, tokens: Arc<TokenService>) -> Self {
        Self { accounts, tokens }
    }

    /// Create an account with the user role and start its first session
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> KbResult<SessionResponse> {
        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;

        // Fast paths; the unique constraints on insert are authoritative
        if self.accounts.find_account_by_username(username).await?.is_some() {
            return Err(KbError::DuplicateUsername);
        }
        if self.accounts.find_account_by_email(email).await?.is_some() {
            return Err(KbError::DuplicateEmail);
        }

        let account = self
            .accounts
            .insert_account(
                NewAccount {
                    username: username.to_string(),
                    email: email.to_string(),
                    password_hash: hash_password(password)?,
                    created_at: Utc::now(),
                },
                Role::User,
            )
            .await?;

        tracing::info!(username = %account.username, id = account.id, "Registered account");

        self.start_session(&account, "Registration successful").await
    }

    /// Verify credentials and replace any existing session
    pub async fn login(&self, username: &str, password: &str) -> KbResult<SessionResponse> {
        let account = match self.accounts.find_account_by_username(username).await? {
            Some(account) => account,
            None => {
                tracing::debug!("Login for unknown username");
                return Err(KbError::InvalidCredentials);
            }
        };

        if !verify_password(password, &account.password_hash) {
            tracing::warn!(username = %account.username, "Login with wrong password");
            return Err(KbError::InvalidCredentials);
        }

        if !account.enabled {
            return Err(KbError::AccountDisabled);
        }

        tracing::info!(username = %account.username, "Login");

        self.start_session(&account, "Login successful").await
    }

    /// Exchange a refresh token for a new pair. Each refresh token works once.
    pub async fn refresh(&self, old_refresh_token: &str) -> KbResult<SessionResponse> {
        // Expiry is judged on the stored grant, after the exact-match check
        let username = self.tokens.parse_username(old_refresh_token)?;

        let account = self
            .accounts
            .find_account_by_username(&username)
            .await?
            .ok_or(KbError::UserNotFound)?;

        if !account.enabled {
            return Err(KbError::AccountDisabled);
        }

        let now = Utc::now();
        match &account.refresh {
            Some(grant) if grant.token == old_refresh_token => {
                if !grant.is_live(now) {
                    return Err(KbError::TokenExpired);
                }
            }
            _ => {
                tracing::warn!(username = %account.username, "Superseded or revoked refresh token presented");
                return Err(KbError::InvalidToken);
            }
        }

        let access = self.tokens.issue_access_token(&account.username)?;
        let refresh = self.tokens.issue_refresh_token(&account.username)?;
        let grant = RefreshGrant {
            token: refresh.value,
            expires_at: refresh.expires_at,
        };

        // Only one caller can swap out a given stored value
        let swapped = self
            .accounts
            .rotate_refresh_grant(account.id, old_refresh_token, &grant, now)
            .await?;
        if !swapped {
            tracing::warn!(username = %account.username, "Lost refresh rotation race");
            return Err(KbError::InvalidToken);
        }

        tracing::debug!(username = %account.username, "Rotated refresh token");

        Ok(SessionResponse {
            access_token: access.value,
            refresh_token: grant.token,
            message: "Token refreshed".to_string(),
        })
    }

    /// End the caller's session by clearing its stored refresh token
    pub async fn logout(&self, principal: &Principal) -> KbResult<()> {
        let cleared = self
            .accounts
            .set_refresh_grant(principal.account_id, None, Utc::now())
            .await?;
        if !cleared {
            return Err(KbError::UserNotFound);
        }

        tracing::info!(username = %principal.username, "Logout");
        Ok(())
    }

    /// Kill another account's session without its owner
    pub async fn revoke(&self, principal: &Principal, username: &str) -> KbResult<()> {
        principal.require_any(&[Role::Admin, Role::Developer])?;

        let target = self
            .accounts
            .find_account_by_username(username)
            .await?
            .ok_or(KbError::UserNotFound)?;

        self.accounts
            .set_refresh_grant(target.id, None, Utc::now())
            .await?;

        tracing::info!(
            by = %principal.username,
            target = %target.username,
            "Revoked session"
        );
        Ok(())
    }

    pub async fn current_user(&self, principal: &Principal) -> KbResult<AccountView> {
        let account = self.load(principal.account_id).await?;
        Ok(AccountView::from(&account))
    }

    pub async fn update_profile(
        &self,
        principal: &Principal,
        update: ProfileUpdate,
    ) -> KbResult<AccountView> {
        if let Some(email) = &update.email {
            validate_email(email)?;

            if let Some(existing) = self.accounts.find_account_by_email(email).await? {
                if existing.id != principal.account_id {
                    return Err(KbError::DuplicateEmail);
                }
            }
        }

        let updated = self
            .accounts
            .update_profile(principal.account_id, &update, Utc::now())
            .await?;
        if !updated {
            return Err(KbError::UserNotFound);
        }

        self.current_user(principal).await
    }

    /// Change the password and drop the stored refresh token
    pub async fn change_password(
        &self,
        principal: &Principal,
        old_password: &str,
        new_password: &str,
    ) -> KbResult<()> {
        let account = self.load(principal.account_id).await?;

        if !verify_password(old_password, &account.password_hash) {
            return Err(KbError::InvalidCredentials);
        }
        validate_password(new_password)?;

        self.accounts
            .update_password(account.id, &hash_password(new_password)?, Utc::now())
            .await?;

        tracing::info!(username = %account.username, "Password changed");
        Ok(())
    }

    async fn load(&self, account_id: i64) -> KbResult<Account> {
        self.accounts
            .find_account_by_id(account_id)
            .await?
            .ok_or(KbError::UserNotFound)
    }

    /// Issue a pair and overwrite the stored refresh grant with it
    async fn start_session(&self, account: &Account, message: &str) -> KbResult<SessionResponse> {
        let access = self.tokens.issue_access_token(&account.username)?;
        let refresh = self.tokens.issue_refresh_token(&account.username)?;
        let grant = RefreshGrant {
            token: refresh.value,
            expires_at: refresh.expires_at,
        };

        self.accounts
            .set_refresh_grant(account.id, Some(&grant), Utc::now())
            .await?;

        Ok(SessionResponse {
            access_token: access.value,
            refresh_token: grant.token,
            message: message.to_string(),
        })
    }
}

fn validate_username(username: &str) -> KbResult<()> {
    if username.len() < 3 || username.len() > 32 {
        return Err(KbError::Validation(
            "Username must be 3 to 32 characters".to_string(),
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(KbError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }

    Ok(())
}

fn validate_email(email: &str) -> KbResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(())
        }
        _ => Err(KbError::Validation("Invalid email format".to_string())),
    }
}

fn validate_password(password: &str) -> KbResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(KbError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
