/// Persistence contracts consumed by the core
///
/// Every operation is a single-entity round trip. Operations that guard an
/// invariant under concurrency (refresh rotation, application approval,
/// status changes) are conditional writes that report whether they applied.

mod accounts;
mod applications;
mod solutions;

use crate::{
    admin::{AdminApplication, ApplicationStatus, Role},
    db::account::{Account, NewAccount, ProfileUpdate, RefreshGrant},
    error::{KbError, KbResult},
    solution::{Category, Solution, SolutionFilter, SolutionStatus, StatusChange},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Account and role persistence
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert an account holding `role`. Unique constraints decide duplicates.
    async fn insert_account(&self, account: NewAccount, role: Role) -> KbResult<Account>;

    async fn find_account_by_id(&self, id: i64) -> KbResult<Option<Account>>;

    async fn find_account_by_username(&self, username: &str) -> KbResult<Option<Account>>;

    async fn find_account_by_email(&self, email: &str) -> KbResult<Option<Account>>;

    /// Overwrite (or clear) the stored refresh grant. Returns false if no such account.
    async fn set_refresh_grant(
        &self,
        account_id: i64,
        grant: Option<&RefreshGrant>,
        now: DateTime<Utc>,
    ) -> KbResult<bool>;

    /// Replace the refresh grant only if the stored token still equals
    /// `expected` and has not expired at `now`.
    async fn rotate_refresh_grant(
        &self,
        account_id: i64,
        expected: &str,
        replacement: &RefreshGrant,
        now: DateTime<Utc>,
    ) -> KbResult<bool>;

    /// Clear every refresh grant that expired before `now`
    async fn clear_expired_refresh_grants(&self, now: DateTime<Utc>) -> KbResult<u64>;

    async fn update_profile(
        &self,
        account_id: i64,
        update: &ProfileUpdate,
        now: DateTime<Utc>,
    ) -> KbResult<bool>;

    /// Store a new password hash and clear the refresh grant
    async fn update_password(
        &self,
        account_id: i64,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> KbResult<bool>;

    /// Grant a role. Returns false if the account already holds it.
    async fn grant_role(&self, account_id: i64, role: Role, now: DateTime<Utc>) -> KbResult<bool>;

    /// Revoke a role. Returns false if the account did not hold it.
    async fn revoke_role(&self, account_id: i64, role: Role) -> KbResult<bool>;

    async fn list_accounts(&self, limit: i64, offset: i64) -> KbResult<Vec<Account>>;
}

/// Solution and category persistence
#[async_trait]
pub trait SolutionRepository: Send + Sync {
    async fn category_exists(&self, category_id: &str) -> KbResult<bool>;

    async fn list_categories(&self) -> KbResult<Vec<Category>>;

    async fn insert_solution(&self, solution: &Solution) -> KbResult<()>;

    async fn find_solution(&self, id: &str) -> KbResult<Option<Solution>>;

    /// Write content fields, steps and images if the stored status is still `expected`
    async fn update_solution_content(
        &self,
        solution: &Solution,
        expected: SolutionStatus,
    ) -> KbResult<bool>;

    /// Apply a status change if the stored status is still `change.from`
    async fn change_solution_status(&self, change: &StatusChange) -> KbResult<bool>;

    /// Delete if the stored status is still `expected`
    async fn delete_solution(&self, id: &str, expected: SolutionStatus) -> KbResult<bool>;

    async fn list_solutions(
        &self,
        filter: &SolutionFilter,
        limit: i64,
        offset: i64,
    ) -> KbResult<Vec<Solution>>;
}

/// Result of the atomic approve-and-grant write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    /// Application was no longer pending when the write ran
    NotPending,
    /// Applicant already held the role; nothing was written
    AlreadyPrivileged,
}

/// Admin application persistence
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Insert a pending application. At most one pending row per applicant.
    async fn insert_application(
        &self,
        applicant_id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> KbResult<AdminApplication>;

    async fn find_application(&self, id: i64) -> KbResult<Option<AdminApplication>>;

    async fn find_pending_application(&self, applicant_id: i64) -> KbResult<Option<AdminApplication>>;

    async fn latest_application(&self, applicant_id: i64) -> KbResult<Option<AdminApplication>>;

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        limit: i64,
        offset: i64,
    ) -> KbResult<Vec<AdminApplication>>;

    /// In one transaction: mark the application approved if still pending,
    /// then grant the admin role to its applicant.
    async fn approve_application(
        &self,
        id: i64,
        processor_id: i64,
        now: DateTime<Utc>,
    ) -> KbResult<ApprovalOutcome>;

    /// Mark the application rejected if still pending
    async fn reject_application(
        &self,
        id: i64,
        processor_id: i64,
        feedback: &str,
        now: DateTime<Utc>,
    ) -> KbResult<bool>;
}

/// SQLite-backed implementation of all repository contracts
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

/// Message of a unique-constraint violation, if that is what `err` is
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Some(db_err.message().to_string())
        }
        _ => None,
    }
}

fn map_unique(err: sqlx::Error, on_unique: impl FnOnce(&str) -> KbError) -> KbError {
    match unique_violation(&err) {
        Some(message) => on_unique(&message),
        None => KbError::Database(err),
    }
}
