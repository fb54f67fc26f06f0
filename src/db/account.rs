/// Account database models
use crate::admin::RoleSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored refresh token together with its expiry.
///
/// Kept as one value so the pair is either fully present or fully absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshGrant {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Account record in the database
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub refresh: Option<RefreshGrant>,
    pub roles: RoleSet,
}

/// Fields needed to insert a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Profile fields an account owner may change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Public view of an account (no secrets)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub enabled: bool,
    pub roles: RoleSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        AccountView {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            nickname: account.nickname.clone(),
            avatar: account.avatar.clone(),
            enabled: account.enabled,
            roles: account.roles,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}
