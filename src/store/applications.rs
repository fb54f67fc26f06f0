use super::{map_unique, ApplicationRepository, ApprovalOutcome, SqliteStore};
use crate::{
    admin::{AdminApplication, ApplicationStatus, Role},
    db::{decode_opt_ts, decode_ts, encode_ts},
    error::{KbError, KbResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

const APPLICATION_COLUMNS: &str =
    "id, applicant_id, status, reason, feedback, processor_id, created_at, processed_at";

fn parse_application(row: &SqliteRow) -> KbResult<AdminApplication> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(AdminApplication {
        id: row.try_get("id")?,
        applicant_id: row.try_get("applicant_id")?,
        status: ApplicationStatus::from_str(&status)?,
        reason: row.try_get("reason")?,
        feedback: row.try_get("feedback")?,
        processor_id: row.try_get("processor_id")?,
        created_at: decode_ts(&created_at)?,
        processed_at: decode_opt_ts(row.try_get("processed_at")?)?,
    })
}

#[async_trait]
impl ApplicationRepository for SqliteStore {
    async fn insert_application(
        &self,
        applicant_id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> KbResult<AdminApplication> {
        let result = sqlx::query(
            "INSERT INTO admin_application (applicant_id, status, reason, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(applicant_id)
        .bind(ApplicationStatus::Pending.as_str())
        .bind(reason)
        .bind(encode_ts(now))
        .execute(&self.db)
        .await
        .map_err(|e| map_unique(e, |_| KbError::DuplicatePendingApplication))?;

        Ok(AdminApplication {
            id: result.last_insert_rowid(),
            applicant_id,
            status: ApplicationStatus::Pending,
            reason: reason.to_string(),
            feedback: None,
            processor_id: None,
            created_at: now,
            processed_at: None,
        })
    }

    async fn find_application(&self, id: i64) -> KbResult<Option<AdminApplication>> {
        let sql = format!(
            "SELECT {} FROM admin_application WHERE id = ?1",
            APPLICATION_COLUMNS
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;

        row.as_ref().map(parse_application).transpose()
    }

    async fn find_pending_application(&self, applicant_id: i64) -> KbResult<Option<AdminApplication>> {
        let sql = format!(
            "SELECT {} FROM admin_application WHERE applicant_id = ?1 AND status = ?2",
            APPLICATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(applicant_id)
            .bind(ApplicationStatus::Pending.as_str())
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(parse_application).transpose()
    }

    async fn latest_application(&self, applicant_id: i64) -> KbResult<Option<AdminApplication>> {
        let sql = format!(
            "SELECT {} FROM admin_application WHERE applicant_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT 1",
            APPLICATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(applicant_id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(parse_application).transpose()
    }

    async fn list_applications(
        &self,
        status: Option<ApplicationStatus>,
        limit: i64,
        offset: i64,
    ) -> KbResult<Vec<AdminApplication>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM admin_application WHERE status = ?1
                     ORDER BY created_at, id LIMIT ?2 OFFSET ?3",
                    APPLICATION_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.db)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM admin_application ORDER BY created_at, id LIMIT ?1 OFFSET ?2",
                    APPLICATION_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.db)
                    .await?
            }
        };

        rows.iter().map(parse_application).collect()
    }

    async fn approve_application(
        &self,
        id: i64,
        processor_id: i64,
        now: DateTime<Utc>,
    ) -> KbResult<ApprovalOutcome> {
        let processed_at = encode_ts(now);
        let mut tx = self.db.begin().await?;

        // Taking the write lock first means the role check below sees every
        // grant committed before us.
        let updated = sqlx::query(
            "UPDATE admin_application
             SET status = ?1, processor_id = ?2, processed_at = ?3
             WHERE id = ?4 AND status = ?5",
        )
        .bind(ApplicationStatus::Approved.as_str())
        .bind(processor_id)
        .bind(&processed_at)
        .bind(id)
        .bind(ApplicationStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ApprovalOutcome::NotPending);
        }

        let applicant_id: i64 =
            sqlx::query_scalar("SELECT applicant_id FROM admin_application WHERE id = ?1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let granted = sqlx::query(
            "INSERT INTO account_role (account_id, role, granted_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (account_id, role) DO NOTHING",
        )
        .bind(applicant_id)
        .bind(Role::Admin.as_str())
        .bind(&processed_at)
        .execute(&mut *tx)
        .await?;

        if granted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ApprovalOutcome::AlreadyPrivileged);
        }

        tx.commit().await?;

        Ok(ApprovalOutcome::Approved)
    }

    async fn reject_application(
        &self,
        id: i64,
        processor_id: i64,
        feedback: &str,
        now: DateTime<Utc>,
    ) -> KbResult<bool> {
        let result = sqlx::query(
            "UPDATE admin_application
             SET status = ?1, feedback = ?2, processor_id = ?3, processed_at = ?4
             WHERE id = ?5 AND status = ?6",
        )
        .bind(ApplicationStatus::Rejected.as_str())
        .bind(feedback)
        .bind(processor_id)
        .bind(encode_ts(now))
        .bind(id)
        .bind(ApplicationStatus::Pending.as_str())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
