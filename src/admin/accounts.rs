/// Developer-side role administration
use crate::{
    admin::Role,
    auth::Principal,
    db::account::AccountView,
    error::{KbError, KbResult},
    store::AccountRepository,
};
use chrono::Utc;
use std::sync::Arc;

pub struct RoleAdministration {
    accounts: Arc<dyn AccountRepository>,
}

impl RoleAdministration {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    pub async fn list_accounts(
        &self,
        principal: &Principal,
        limit: i64,
        offset: i64,
    ) -> KbResult<Vec<AccountView>> {
        principal.require(Role::Developer)?;

        let accounts = self.accounts.list_accounts(limit, offset).await?;
        Ok(accounts.iter().map(AccountView::from).collect())
    }

    /// Grant the admin role directly, bypassing the application workflow
    pub async fn promote_to_admin(&self, principal: &Principal, account_id: i64) -> KbResult<AccountView> {
        principal.require(Role::Developer)?;
        self.ensure_exists(account_id).await?;

        if !self.accounts.grant_role(account_id, Role::Admin, Utc::now()).await? {
            return Err(KbError::AlreadyPrivileged);
        }

        tracing::info!(account_id, by = %principal.username, "Granted admin role");
        self.view(account_id).await
    }

    pub async fn revoke_admin(&self, principal: &Principal, account_id: i64) -> KbResult<AccountView> {
        principal.require(Role::Developer)?;
        self.ensure_exists(account_id).await?;

        if !self.accounts.revoke_role(account_id, Role::Admin).await? {
            return Err(KbError::NotPrivileged);
        }

        tracing::info!(account_id, by = %principal.username, "Revoked admin role");
        self.view(account_id).await
    }

    /// Grant the developer role to configured usernames. Missing accounts are skipped.
    pub async fn bootstrap_developers(&self, usernames: &[String]) -> KbResult<usize> {
        let mut granted = 0;

        for username in usernames {
            match self.accounts.find_account_by_username(username).await? {
                Some(account) => {
                    if self
                        .accounts
                        .grant_role(account.id, Role::Developer, Utc::now())
                        .await?
                    {
                        tracing::info!(username = %username, "Granted developer role from configuration");
                        granted += 1;
                    }
                }
                None => {
                    tracing::warn!(username = %username, "Configured developer account does not exist yet");
                }
            }
        }

        Ok(granted)
    }

    async fn ensure_exists(&self, account_id: i64) -> KbResult<()> {
        self.view(account_id).await.map(|_| ())
    }

    async fn view(&self, account_id: i64) -> KbResult<AccountView> {
        let account = self
            .accounts
            .find_account_by_id(account_id)
            .await?
            .ok_or(KbError::UserNotFound)?;

        Ok(AccountView::from(&account))
    }
}
