/// Solution workflow engine
///
/// Every mutating call runs role check, then ownership check for owner-gated
/// edges, then the state check, then a status-conditional write. A write that
/// finds the status moved underneath it fails the same way the state check would.
use super::{
    Actor, Category, Solution, SolutionAction, SolutionChanges, SolutionDraft, SolutionFilter,
    SolutionStatus, StatusChange,
};
use crate::{
    admin::Role,
    auth::{require_owner, Principal},
    error::{KbError, KbResult},
    store::SolutionRepository,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_REJECT_NOTE: &str = "Solution does not meet the formatting requirements";

/// Role that authors solutions
pub const CREATOR_ROLE: Role = Role::Admin;

/// Role that reviews solutions
pub const REVIEWER_ROLE: Role = Role::Developer;

pub struct SolutionWorkflow {
    solutions: Arc<dyn SolutionRepository>,
}

impl SolutionWorkflow {
    pub fn new(solutions: Arc<dyn SolutionRepository>) -> Self {
        Self { solutions }
    }

    pub async fn list_categories(&self) -> KbResult<Vec<Category>> {
        self.solutions.list_categories().await
    }

    /// Create a draft owned by the caller
    pub async fn create(&self, principal: &Principal, draft: SolutionDraft) -> KbResult<Solution> {
        principal.require(CREATOR_ROLE)?;
        validate_text("title", &draft.title)?;
        validate_text("description", &draft.description)?;
        self.ensure_category(&draft.category_id).await?;

        let now = Utc::now();
        let solution = Solution {
            id: Uuid::new_v4().to_string(),
            category_id: draft.category_id,
            title: draft.title,
            difficulty: draft.difficulty,
            version: draft.version,
            description: draft.description,
            notes: draft.notes,
            status: SolutionStatus::Draft,
            created_by: principal.account_id,
            reviewed_by: None,
            steps: draft.steps,
            images: draft.images,
            created_at: now,
            updated_at: now,
        };

        self.solutions.insert_solution(&solution).await?;

        tracing::info!(solution_id = %solution.id, by = %principal.username, "Created solution draft");
        Ok(solution)
    }

    /// Owner edit. Allowed from DRAFT or PUBLISHED.
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        changes: SolutionChanges,
    ) -> KbResult<Solution> {
        principal.require(CREATOR_ROLE)?;

        let solution = self.load(id).await?;
        require_owner(principal, solution.created_by, "edit this solution")?;
        solution.status.ensure_editable()?;

        self.write_changes(solution, changes).await
    }

    /// Reviewer edit of published content, regardless of who wrote it
    pub async fn developer_update(
        &self,
        principal: &Principal,
        id: &str,
        changes: SolutionChanges,
    ) -> KbResult<Solution> {
        principal.require(REVIEWER_ROLE)?;

        let solution = self.load(id).await?;
        if solution.status != SolutionStatus::Published {
            return Err(KbError::InvalidStateTransition {
                action: "edit",
                required: SolutionStatus::Published.as_str(),
            });
        }

        tracing::info!(solution_id = %id, by = %principal.username, "Reviewer edit");
        self.write_changes(solution, changes).await
    }

    pub async fn delete(&self, principal: &Principal, id: &str) -> KbResult<()> {
        principal.require(CREATOR_ROLE)?;

        let solution = self.load(id).await?;
        require_owner(principal, solution.created_by, "delete this solution")?;
        solution.status.ensure_deletable()?;

        if !self.solutions.delete_solution(id, SolutionStatus::Draft).await? {
            return Err(KbError::InvalidStateTransition {
                action: "delete",
                required: SolutionStatus::Draft.as_str(),
            });
        }

        tracing::info!(solution_id = %id, by = %principal.username, "Deleted solution draft");
        Ok(())
    }

    pub async fn submit(&self, principal: &Principal, id: &str) -> KbResult<Solution> {
        self.transition(principal, id, SolutionAction::SubmitForReview, None)
            .await
    }

    pub async fn approve(&self, principal: &Principal, id: &str) -> KbResult<Solution> {
        self.transition(principal, id, SolutionAction::Approve, None)
            .await
    }

    /// Send back to DRAFT. The reason replaces the solution's notes.
    pub async fn reject(
        &self,
        principal: &Principal,
        id: &str,
        reason: Option<&str>,
    ) -> KbResult<Solution> {
        let note = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REJECT_NOTE)
            .to_string();

        self.transition(principal, id, SolutionAction::Reject, Some(note))
            .await
    }

    pub async fn withdraw(&self, principal: &Principal, id: &str) -> KbResult<Solution> {
        self.transition(principal, id, SolutionAction::Withdraw, None)
            .await
    }

    /// Public read; anything not published is reported as missing
    pub async fn get_published(&self, id: &str) -> KbResult<Solution> {
        let solution = self.load(id).await?;
        if solution.status != SolutionStatus::Published {
            return Err(KbError::SolutionNotFound);
        }
        Ok(solution)
    }

    /// Privileged read. Reviewers see everything, authors their own work and published content.
    pub async fn get(&self, principal: &Principal, id: &str) -> KbResult<Solution> {
        principal.require_any(&[CREATOR_ROLE, REVIEWER_ROLE])?;

        let solution = self.load(id).await?;
        if !principal.has_role(REVIEWER_ROLE) && solution.status != SolutionStatus::Published {
            require_owner(principal, solution.created_by, "view this solution")?;
        }
        Ok(solution)
    }

    pub async fn list_published(&self, limit: i64, offset: i64) -> KbResult<Vec<Solution>> {
        let filter = SolutionFilter {
            status: Some(SolutionStatus::Published),
            created_by: None,
        };
        self.solutions.list_solutions(&filter, limit, offset).await
    }

    pub async fn list_mine(
        &self,
        principal: &Principal,
        status: Option<SolutionStatus>,
        limit: i64,
        offset: i64,
    ) -> KbResult<Vec<Solution>> {
        principal.require(CREATOR_ROLE)?;

        let filter = SolutionFilter {
            status,
            created_by: Some(principal.account_id),
        };
        self.solutions.list_solutions(&filter, limit, offset).await
    }

    pub async fn list_pending_review(
        &self,
        principal: &Principal,
        limit: i64,
        offset: i64,
    ) -> KbResult<Vec<Solution>> {
        principal.require(REVIEWER_ROLE)?;

        let filter = SolutionFilter {
            status: Some(SolutionStatus::PendingReview),
            created_by: None,
        };
        self.solutions.list_solutions(&filter, limit, offset).await
    }

    async fn transition(
        &self,
        principal: &Principal,
        id: &str,
        action: SolutionAction,
        notes: Option<String>,
    ) -> KbResult<Solution> {
        let edge = action.transition();
        match edge.actor {
            Actor::Owner => principal.require(CREATOR_ROLE)?,
            Actor::Reviewer => principal.require(REVIEWER_ROLE)?,
        }

        let solution = self.load(id).await?;
        if edge.actor == Actor::Owner {
            require_owner(principal, solution.created_by, action.name())?;
        }

        let to = solution.status.apply(action)?;

        let change = StatusChange {
            solution_id: solution.id.clone(),
            from: solution.status,
            to,
            reviewed_by: edge.records_reviewer.then_some(principal.account_id),
            notes,
            at: Utc::now(),
        };

        if !self.solutions.change_solution_status(&change).await? {
            // Someone else moved it between our read and write
            return Err(KbError::InvalidStateTransition {
                action: action.name(),
                required: edge.from.as_str(),
            });
        }

        tracing::info!(
            solution_id = %id,
            from = %change.from,
            to = %change.to,
            by = %principal.username,
            "Solution status changed"
        );

        self.load(id).await
    }

    async fn write_changes(&self, mut solution: Solution, changes: SolutionChanges) -> KbResult<Solution> {
        if let Some(title) = &changes.title {
            validate_text("title", title)?;
        }
        if let Some(description) = &changes.description {
            validate_text("description", description)?;
        }
        if let Some(category_id) = &changes.category_id {
            self.ensure_category(category_id).await?;
        }

        let expected = solution.status;
        changes.apply_to(&mut solution);
        solution.updated_at = Utc::now();

        if !self
            .solutions
            .update_solution_content(&solution, expected)
            .await?
        {
            return Err(KbError::InvalidStateTransition {
                action: "edit",
                required: "DRAFT or PUBLISHED",
            });
        }

        Ok(solution)
    }

    async fn ensure_category(&self, category_id: &str) -> KbResult<()> {
        if self.solutions.category_exists(category_id).await? {
            Ok(())
        } else {
            Err(KbError::CategoryNotFound)
        }
    }

    async fn load(&self, id: &str) -> KbResult<Solution> {
        self.solutions
            .find_solution(id)
            .await?
            .ok_or(KbError::SolutionNotFound)
    }
}

fn validate_text(field: &str, value: &str) -> KbResult<()> {
    if value.trim().is_empty() {
        return Err(KbError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::account::NewAccount,
        store::{AccountRepository, SqliteStore},
        testing::memory_store,
    };

    struct Fixture {
        workflow: SolutionWorkflow,
        author: Principal,
        other_admin: Principal,
        reviewer: Principal,
    }

    async fn insert(store: &SqliteStore, username: &str, role: Role) -> Principal {
        let account = store
            .insert_account(
                NewAccount {
                    username: username.to_string(),
                    email: format!("{}@x.com", username),
                    password_hash: "hash".to_string(),
                    created_at: Utc::now(),
                },
                role,
            )
            .await
            .unwrap();
        Principal::from(&account)
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(memory_store().await);
        let author = insert(&store, "author", Role::Admin).await;
        let other_admin = insert(&store, "other", Role::Admin).await;
        let reviewer = insert(&store, "reviewer", Role::Developer).await;

        Fixture {
            workflow: SolutionWorkflow::new(store),
            author,
            other_admin,
            reviewer,
        }
    }

    fn draft() -> SolutionDraft {
        SolutionDraft {
            category_id: "launcher".to_string(),
            title: "Launcher stuck on update".to_string(),
            difficulty: "easy".to_string(),
            version: "2.1".to_string(),
            description: "Progress bar never moves".to_string(),
            notes: Some("seen on Windows".to_string()),
            steps: vec!["Clear cache".to_string(), "Restart launcher".to_string()],
            images: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_starts_in_draft() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();

        assert_eq!(solution.status, SolutionStatus::Draft);
        assert_eq!(solution.created_by, f.author.account_id);
        assert!(solution.reviewed_by.is_none());
    }

    #[tokio::test]
    async fn test_create_requires_admin_and_known_category() {
        let f = fixture().await;

        assert!(matches!(
            f.workflow.create(&f.reviewer, draft()).await,
            Err(KbError::PermissionDenied(_))
        ));

        let mut bad = draft();
        bad.category_id = "graphics".to_string();
        assert!(matches!(
            f.workflow.create(&f.author, bad).await,
            Err(KbError::CategoryNotFound)
        ));
    }

    #[tokio::test]
    async fn test_submit_then_approve_publishes() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();

        let pending = f.workflow.submit(&f.author, &solution.id).await.unwrap();
        assert_eq!(pending.status, SolutionStatus::PendingReview);

        let published = f.workflow.approve(&f.reviewer, &solution.id).await.unwrap();
        assert_eq!(published.status, SolutionStatus::Published);
        assert_eq!(published.reviewed_by, Some(f.reviewer.account_id));
    }

    #[tokio::test]
    async fn test_reject_sets_notes() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();
        f.workflow.submit(&f.author, &solution.id).await.unwrap();

        let rejected = f
            .workflow
            .reject(&f.reviewer, &solution.id, Some("bad formatting"))
            .await
            .unwrap();
        assert_eq!(rejected.status, SolutionStatus::Draft);
        assert_eq!(rejected.notes.as_deref(), Some("bad formatting"));
        assert_eq!(rejected.reviewed_by, Some(f.reviewer.account_id));

        f.workflow.submit(&f.author, &solution.id).await.unwrap();
        let rejected = f.workflow.reject(&f.reviewer, &solution.id, None).await.unwrap();
        assert_eq!(rejected.notes.as_deref(), Some(DEFAULT_REJECT_NOTE));
    }

    #[tokio::test]
    async fn test_mismatched_state_leaves_status_unchanged() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();

        let err = f.workflow.approve(&f.reviewer, &solution.id).await.unwrap_err();
        match err {
            KbError::InvalidStateTransition { required, .. } => {
                assert_eq!(required, "PENDING_REVIEW")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            f.workflow.withdraw(&f.author, &solution.id).await,
            Err(KbError::InvalidStateTransition { .. })
        ));

        let stored = f.workflow.get(&f.reviewer, &solution.id).await.unwrap();
        assert_eq!(stored.status, SolutionStatus::Draft);
    }

    #[tokio::test]
    async fn test_ownership_is_per_resource() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();

        assert!(matches!(
            f.workflow.submit(&f.other_admin, &solution.id).await,
            Err(KbError::PermissionDenied(_))
        ));
        assert!(matches!(
            f.workflow
                .update(&f.other_admin, &solution.id, SolutionChanges::default())
                .await,
            Err(KbError::PermissionDenied(_))
        ));

        f.workflow.submit(&f.author, &solution.id).await.unwrap();
        f.workflow.approve(&f.reviewer, &solution.id).await.unwrap();

        assert!(matches!(
            f.workflow.withdraw(&f.other_admin, &solution.id).await,
            Err(KbError::PermissionDenied(_))
        ));
        // A reviewer is not the owner either
        assert!(matches!(
            f.workflow.withdraw(&f.reviewer, &solution.id).await,
            Err(KbError::PermissionDenied(_))
        ));

        let withdrawn = f.workflow.withdraw(&f.author, &solution.id).await.unwrap();
        assert_eq!(withdrawn.status, SolutionStatus::Draft);
    }

    #[tokio::test]
    async fn test_edit_blocked_while_pending() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();
        f.workflow.submit(&f.author, &solution.id).await.unwrap();

        let changes = SolutionChanges {
            title: Some("New title".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.workflow.update(&f.author, &solution.id, changes).await,
            Err(KbError::InvalidStateTransition { action: "edit", .. })
        ));
    }

    #[tokio::test]
    async fn test_update_replaces_steps() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();

        let changes = SolutionChanges {
            steps: Some(vec!["Only this".to_string()]),
            images: Some(vec!["a.png".to_string(), "b.png".to_string()]),
            ..Default::default()
        };
        let updated = f
            .workflow
            .update(&f.author, &solution.id, changes)
            .await
            .unwrap();
        assert_eq!(updated.steps, vec!["Only this"]);
        assert_eq!(updated.title, "Launcher stuck on update");

        let stored = f.workflow.get(&f.author, &solution.id).await.unwrap();
        assert_eq!(stored.images, vec!["a.png", "b.png"]);
    }

    #[tokio::test]
    async fn test_delete_only_from_draft() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();
        f.workflow.submit(&f.author, &solution.id).await.unwrap();

        assert!(matches!(
            f.workflow.delete(&f.author, &solution.id).await,
            Err(KbError::InvalidStateTransition { action: "delete", .. })
        ));

        f.workflow.reject(&f.reviewer, &solution.id, None).await.unwrap();
        f.workflow.delete(&f.author, &solution.id).await.unwrap();
        assert!(matches!(
            f.workflow.get(&f.author, &solution.id).await,
            Err(KbError::SolutionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_developer_update_only_when_published() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();
        let changes = || SolutionChanges {
            version: Some("2.2".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            f.workflow
                .developer_update(&f.reviewer, &solution.id, changes())
                .await,
            Err(KbError::InvalidStateTransition { .. })
        ));

        f.workflow.submit(&f.author, &solution.id).await.unwrap();
        f.workflow.approve(&f.reviewer, &solution.id).await.unwrap();

        let updated = f
            .workflow
            .developer_update(&f.reviewer, &solution.id, changes())
            .await
            .unwrap();
        assert_eq!(updated.version, "2.2");
        assert_eq!(updated.status, SolutionStatus::Published);
    }

    #[tokio::test]
    async fn test_public_reads_hide_unpublished() {
        let f = fixture().await;
        let solution = f.workflow.create(&f.author, draft()).await.unwrap();

        assert!(matches!(
            f.workflow.get_published(&solution.id).await,
            Err(KbError::SolutionNotFound)
        ));
        assert!(f.workflow.list_published(10, 0).await.unwrap().is_empty());
        assert!(matches!(
            f.workflow.get(&f.other_admin, &solution.id).await,
            Err(KbError::PermissionDenied(_))
        ));

        f.workflow.submit(&f.author, &solution.id).await.unwrap();
        assert_eq!(
            f.workflow.list_pending_review(&f.reviewer, 10, 0).await.unwrap().len(),
            1
        );
        f.workflow.approve(&f.reviewer, &solution.id).await.unwrap();

        assert!(f.workflow.get_published(&solution.id).await.is_ok());
        assert_eq!(f.workflow.list_published(10, 0).await.unwrap().len(), 1);
        assert_eq!(
            f.workflow
                .list_mine(&f.author, Some(SolutionStatus::Published), 10, 0)
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(f
            .workflow
            .list_mine(&f.other_admin, None, 10, 0)
            .await
            .unwrap()
            .is_empty());
    }
}
