use super::{map_unique, AccountRepository, SqliteStore};
use crate::{
    admin::{Role, RoleSet},
    db::{
        account::{Account, NewAccount, ProfileUpdate, RefreshGrant},
        decode_opt_ts, decode_ts, encode_ts,
    },
    error::{KbError, KbResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, nickname, avatar, enabled,
     created_at, updated_at, refresh_token, refresh_token_expiry";

impl SqliteStore {
    async fn load_roles(&self, account_id: i64) -> KbResult<RoleSet> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT role FROM account_role WHERE account_id = ?1")
                .bind(account_id)
                .fetch_all(&self.db)
                .await?;

        rows.iter().map(|r| Role::from_str(r)).collect()
    }

    async fn parse_account(&self, row: SqliteRow) -> KbResult<Account> {
        let id: i64 = row.try_get("id")?;

        let refresh_token: Option<String> = row.try_get("refresh_token")?;
        let refresh_expiry = decode_opt_ts(row.try_get("refresh_token_expiry")?)?;
        let refresh = match (refresh_token, refresh_expiry) {
            (Some(token), Some(expires_at)) => Some(RefreshGrant { token, expires_at }),
            (None, None) => None,
            _ => {
                return Err(KbError::Internal(format!(
                    "Account {} has a half-set refresh token",
                    id
                )))
            }
        };

        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Account {
            id,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            nickname: row.try_get("nickname")?,
            avatar: row.try_get("avatar")?,
            enabled: row.try_get("enabled")?,
            created_at: decode_ts(&created_at)?,
            updated_at: decode_ts(&updated_at)?,
            refresh,
            roles: self.load_roles(id).await?,
        })
    }

    async fn find_account_where(&self, column: &str, value: &str) -> KbResult<Option<Account>> {
        let sql = format!("SELECT {} FROM account WHERE {} = ?1", ACCOUNT_COLUMNS, column);
        let row = sqlx::query(&sql).bind(value).fetch_optional(&self.db).await?;

        match row {
            Some(row) => Ok(Some(self.parse_account(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AccountRepository for SqliteStore {
    async fn insert_account(&self, account: NewAccount, role: Role) -> KbResult<Account> {
        let created = encode_ts(account.created_at);
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "INSERT INTO account (username, email, password_hash, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&created)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_unique(e, |message| {
                if message.contains("email") {
                    KbError::DuplicateEmail
                } else {
                    KbError::DuplicateUsername
                }
            })
        })?;

        let id = result.last_insert_rowid();

        sqlx::query("INSERT INTO account_role (account_id, role, granted_at) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(role.as_str())
            .bind(&created)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Account {
            id,
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            nickname: None,
            avatar: None,
            enabled: true,
            created_at: account.created_at,
            updated_at: account.created_at,
            refresh: None,
            roles: RoleSet::empty().with(role),
        })
    }

    async fn find_account_by_id(&self, id: i64) -> KbResult<Option<Account>> {
        let sql = format!("SELECT {} FROM account WHERE id = ?1", ACCOUNT_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;

        match row {
            Some(row) => Ok(Some(self.parse_account(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_account_by_username(&self, username: &str) -> KbResult<Option<Account>> {
        self.find_account_where("username", username).await
    }

    async fn find_account_by_email(&self, email: &str) -> KbResult<Option<Account>> {
        self.find_account_where("email", email).await
    }

    async fn set_refresh_grant(
        &self,
        account_id: i64,
        grant: Option<&RefreshGrant>,
        now: DateTime<Utc>,
    ) -> KbResult<bool> {
        let result = sqlx::query(
            "UPDATE account
             SET refresh_token = ?1, refresh_token_expiry = ?2, updated_at = ?3
             WHERE id = ?4",
        )
        .bind(grant.map(|g| g.token.as_str()))
        .bind(grant.map(|g| encode_ts(g.expires_at)))
        .bind(encode_ts(now))
        .bind(account_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn rotate_refresh_grant(
        &self,
        account_id: i64,
        expected: &str,
        replacement: &RefreshGrant,
        now: DateTime<Utc>,
    ) -> KbResult<bool> {
        let now_raw = encode_ts(now);
        let result = sqlx::query(
            "UPDATE account
             SET refresh_token = ?1, refresh_token_expiry = ?2, updated_at = ?3
             WHERE id = ?4 AND refresh_token = ?5 AND refresh_token_expiry > ?3",
        )
        .bind(&replacement.token)
        .bind(encode_ts(replacement.expires_at))
        .bind(&now_raw)
        .bind(account_id)
        .bind(expected)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_expired_refresh_grants(&self, now: DateTime<Utc>) -> KbResult<u64> {
        let result = sqlx::query(
            "UPDATE account
             SET refresh_token = NULL, refresh_token_expiry = NULL
             WHERE refresh_token_expiry IS NOT NULL AND refresh_token_expiry <= ?1",
        )
        .bind(encode_ts(now))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn update_profile(
        &self,
        account_id: i64,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> KbResult<bool> {
        let result = sqlx::query(
            "UPDATE account
             SET nickname = COALESCE(?1, nickname),
                 email = COALESCE(?2, email),
                 avatar = COALESCE(?3, avatar),
                 updated_at = ?4
             WHERE id = ?5",
        )
        .bind(&update.nickname)
        .bind(&update.email)
        .bind(&update.avatar)
        .bind(encode_ts(now))
        .bind(account_id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique(e, |_| KbError::DuplicateEmail))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_password(
        &self,
        account_id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> KbResult<bool> {
        let result = sqlx::query(
            "UPDATE account
             SET password_hash = ?1, refresh_token = NULL, refresh_token_expiry = NULL,
                 updated_at = ?2
             WHERE id = ?3",
        )
        .bind(password_hash)
        .bind(encode_ts(now))
        .bind(account_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn grant_role(&self, account_id: i64, role: Role, now: DateTime<Utc>) -> KbResult<bool> {
        let result = sqlx::query(
            "INSERT INTO account_role (account_id, role, granted_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (account_id, role) DO NOTHING",
        )
        .bind(account_id)
        .bind(role.as_str())
        .bind(encode_ts(now))
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_role(&self, account_id: i64, role: Role) -> KbResult<bool> {
        let result = sqlx::query("DELETE FROM account_role WHERE account_id = ?1 AND role = ?2")
            .bind(account_id)
            .bind(role.as_str())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_accounts(&self, limit: i64, offset: i64) -> KbResult<Vec<Account>> {
        let sql = format!(
            "SELECT {} FROM account ORDER BY id LIMIT ?1 OFFSET ?2",
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;

        let mut accounts = Vec::with_capacity(rows.len());
        for row in rows {
            accounts.push(self.parse_account(row).await?);
        }

        Ok(accounts)
    }
}
