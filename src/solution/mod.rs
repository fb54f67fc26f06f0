/// Solution content model and its review lifecycle
///
/// The transition table in [`SolutionAction::transition`] is the only place
/// status edges are defined; every status write goes through it.

mod workflow;

pub use workflow::SolutionWorkflow;

use crate::error::{KbError, KbResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Solution lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolutionStatus {
    Draft,
    PendingReview,
    Published,
}

impl SolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolutionStatus::Draft => "DRAFT",
            SolutionStatus::PendingReview => "PENDING_REVIEW",
            SolutionStatus::Published => "PUBLISHED",
        }
    }

    pub fn from_str(s: &str) -> KbResult<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Ok(SolutionStatus::Draft),
            "PENDING_REVIEW" => Ok(SolutionStatus::PendingReview),
            "PUBLISHED" => Ok(SolutionStatus::Published),
            _ => Err(KbError::Validation(format!("Invalid solution status: {}", s))),
        }
    }

    /// Apply a workflow action, returning the new status
    pub fn apply(self, action: SolutionAction) -> KbResult<SolutionStatus> {
        let edge = action.transition();
        if self != edge.from {
            return Err(KbError::InvalidStateTransition {
                action: action.name(),
                required: edge.from.as_str(),
            });
        }
        Ok(edge.to)
    }

    /// Content edits are blocked while a review is in flight
    pub fn ensure_editable(self) -> KbResult<()> {
        match self {
            SolutionStatus::Draft | SolutionStatus::Published => Ok(()),
            SolutionStatus::PendingReview => Err(KbError::InvalidStateTransition {
                action: "edit",
                required: "DRAFT or PUBLISHED",
            }),
        }
    }

    /// Published content carries a review trail and cannot be deleted
    pub fn ensure_deletable(self) -> KbResult<()> {
        match self {
            SolutionStatus::Draft => Ok(()),
            _ => Err(KbError::InvalidStateTransition {
                action: "delete",
                required: SolutionStatus::Draft.as_str(),
            }),
        }
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may trigger a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The solution's creator, holding the admin role
    Owner,
    /// Any account holding the developer role
    Reviewer,
}

/// One edge of the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SolutionStatus,
    pub to: SolutionStatus,
    pub actor: Actor,
    /// Reviewer id is recorded on the solution
    pub records_reviewer: bool,
}

/// Workflow actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolutionAction {
    SubmitForReview,
    Approve,
    Reject,
    Withdraw,
}

impl SolutionAction {
    pub fn transition(self) -> Transition {
        use SolutionStatus::*;
        match self {
            SolutionAction::SubmitForReview => Transition {
                from: Draft,
                to: PendingReview,
                actor: Actor::Owner,
                records_reviewer: false,
            },
            SolutionAction::Approve => Transition {
                from: PendingReview,
                to: Published,
                actor: Actor::Reviewer,
                records_reviewer: true,
            },
            SolutionAction::Reject => Transition {
                from: PendingReview,
                to: Draft,
                actor: Actor::Reviewer,
                records_reviewer: true,
            },
            SolutionAction::Withdraw => Transition {
                from: Published,
                to: Draft,
                actor: Actor::Owner,
                records_reviewer: false,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SolutionAction::SubmitForReview => "submit for review",
            SolutionAction::Approve => "approve",
            SolutionAction::Reject => "reject",
            SolutionAction::Withdraw => "withdraw",
        }
    }
}

/// Solution category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Solution record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub difficulty: String,
    pub version: String,
    pub description: String,
    /// Author notes; replaced by the rejection reason on reject
    pub notes: Option<String>,
    pub status: SolutionStatus,
    pub created_by: i64,
    pub reviewed_by: Option<i64>,
    pub steps: Vec<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a solution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionDraft {
    pub category_id: String,
    pub title: String,
    pub difficulty: String,
    pub version: String,
    pub description: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Partial content update. Steps and images are replaced wholesale when given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionChanges {
    pub category_id: Option<String>,
    pub title: Option<String>,
    pub difficulty: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub steps: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl SolutionChanges {
    pub fn apply_to(self, solution: &mut Solution) {
        if let Some(category_id) = self.category_id {
            solution.category_id = category_id;
        }
        if let Some(title) = self.title {
            solution.title = title;
        }
        if let Some(difficulty) = self.difficulty {
            solution.difficulty = difficulty;
        }
        if let Some(version) = self.version {
            solution.version = version;
        }
        if let Some(description) = self.description {
            solution.description = description;
        }
        if let Some(notes) = self.notes {
            solution.notes = Some(notes);
        }
        if let Some(steps) = self.steps {
            solution.steps = steps;
        }
        if let Some(images) = self.images {
            solution.images = images;
        }
    }
}

/// Status write produced by a workflow transition
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub solution_id: String,
    pub from: SolutionStatus,
    pub to: SolutionStatus,
    pub reviewed_by: Option<i64>,
    pub notes: Option<String>,
    pub at: DateTime<Utc>,
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct SolutionFilter {
    pub status: Option<SolutionStatus>,
    pub created_by: Option<i64>,
}
