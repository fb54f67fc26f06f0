/// Privilege-elevation workflow: accounts apply for the admin role and a
/// developer approves or rejects each application exactly once.
use crate::{
    admin::Role,
    auth::Principal,
    error::{KbError, KbResult},
    store::{AccountRepository, ApplicationRepository, ApprovalOutcome},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_REJECT_FEEDBACK: &str = "Application does not meet the requirements";

/// The role applications ask for
pub const TARGET_ROLE: Role = Role::Admin;

/// The role that processes applications
pub const PROCESSOR_ROLE: Role = Role::Developer;

/// Application status. Approved and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "PENDING",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> KbResult<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(ApplicationStatus::Pending),
            "APPROVED" => Ok(ApplicationStatus::Approved),
            "REJECTED" => Ok(ApplicationStatus::Rejected),
            _ => Err(KbError::Validation(format!(
                "Invalid application status: {}",
                s
            ))),
        }
    }
}

/// Admin application record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminApplication {
    pub id: i64,
    pub applicant_id: i64,
    pub status: ApplicationStatus,
    pub reason: String,
    pub feedback: Option<String>,
    pub processor_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Application submission body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub reason: String,
}

/// Rejection body; feedback falls back to a default text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectApplicationRequest {
    pub feedback: Option<String>,
}

/// Elevation workflow service
pub struct ElevationWorkflow {
    accounts: Arc<dyn AccountRepository>,
    applications: Arc<dyn ApplicationRepository>,
}

impl ElevationWorkflow {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        applications: Arc<dyn ApplicationRepository>,
    ) -> Self {
        Self {
            accounts,
            applications,
        }
    }

    /// File an application for the admin role
    pub async fn apply(&self, principal: &Principal, reason: &str) -> KbResult<AdminApplication> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(KbError::Validation("Reason cannot be empty".to_string()));
        }

        // Roles on the principal may be stale; check the stored set
        let account = self
            .accounts
            .find_account_by_id(principal.account_id)
            .await?
            .ok_or(KbError::UserNotFound)?;
        if account.roles.contains(TARGET_ROLE) {
            return Err(KbError::AlreadyPrivileged);
        }

        if self
            .applications
            .find_pending_application(account.id)
            .await?
            .is_some()
        {
            return Err(KbError::DuplicatePendingApplication);
        }

        // The partial unique index catches applies racing past the check above
        let application = self
            .applications
            .insert_application(account.id, reason, Utc::now())
            .await?;

        tracing::info!(
            username = %account.username,
            application_id = application.id,
            "Admin application filed"
        );
        Ok(application)
    }

    /// Approve a pending application and grant the role in one write
    pub async fn approve(&self, principal: &Principal, application_id: i64) -> KbResult<AdminApplication> {
        principal.require(PROCESSOR_ROLE)?;

        let application = self.load(application_id).await?;
        if application.status != ApplicationStatus::Pending {
            return Err(KbError::InvalidApplicationStatus);
        }

        let outcome = self
            .applications
            .approve_application(application_id, principal.account_id, Utc::now())
            .await?;

        match outcome {
            ApprovalOutcome::Approved => {
                tracing::info!(
                    application_id,
                    applicant_id = application.applicant_id,
                    by = %principal.username,
                    "Admin application approved"
                );
                self.load(application_id).await
            }
            ApprovalOutcome::NotPending => Err(KbError::InvalidApplicationStatus),
            ApprovalOutcome::AlreadyPrivileged => {
                tracing::warn!(
                    application_id,
                    applicant_id = application.applicant_id,
                    "Applicant already holds the admin role"
                );
                Err(KbError::AlreadyPrivileged)
            }
        }
    }

    pub async fn reject(
        &self,
        principal: &Principal,
        application_id: i64,
        feedback: Option<&str>,
    ) -> KbResult<AdminApplication> {
        principal.require(PROCESSOR_ROLE)?;

        let application = self.load(application_id).await?;
        if application.status != ApplicationStatus::Pending {
            return Err(KbError::InvalidApplicationStatus);
        }

        let feedback = feedback
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_REJECT_FEEDBACK);

        let rejected = self
            .applications
            .reject_application(application_id, principal.account_id, feedback, Utc::now())
            .await?;
        if !rejected {
            return Err(KbError::InvalidApplicationStatus);
        }

        tracing::info!(application_id, by = %principal.username, "Admin application rejected");
        self.load(application_id).await
    }

    /// The caller's most recent application
    pub async fn my_application(&self, principal: &Principal) -> KbResult<AdminApplication> {
        self.applications
            .latest_application(principal.account_id)
            .await?
            .ok_or(KbError::ApplicationNotFound)
    }

    pub async fn list_pending(
        &self,
        principal: &Principal,
        limit: i64,
        offset: i64,
    ) -> KbResult<Vec<AdminApplication>> {
        principal.require(PROCESSOR_ROLE)?;

        self.applications
            .list_applications(Some(ApplicationStatus::Pending), limit, offset)
            .await
    }

    async fn load(&self, application_id: i64) -> KbResult<AdminApplication> {
        self.applications
            .find_application(application_id)
            .await?
            .ok_or(KbError::ApplicationNotFound)
    }
}
