use super::{SolutionRepository, SqliteStore};
use crate::{
    db::{decode_ts, encode_ts},
    error::KbResult,
    solution::{Category, Solution, SolutionFilter, SolutionStatus, StatusChange},
};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, Transaction};

const SOLUTION_COLUMNS: &str = "id, category_id, title, difficulty, version, description, notes,
     status, created_by, reviewed_by, created_at, updated_at";

impl SqliteStore {
    async fn load_ordered(&self, table: &str, column: &str, solution_id: &str) -> KbResult<Vec<String>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE solution_id = ?1 ORDER BY position",
            column, table
        );
        let values: Vec<String> = sqlx::query_scalar(&sql)
            .bind(solution_id)
            .fetch_all(&self.db)
            .await?;

        Ok(values)
    }

    async fn parse_solution(&self, row: SqliteRow) -> KbResult<Solution> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let steps = self.load_ordered("solution_step", "content", &id).await?;
        let images = self.load_ordered("solution_image", "image_ref", &id).await?;

        Ok(Solution {
            category_id: row.try_get("category_id")?,
            title: row.try_get("title")?,
            difficulty: row.try_get("difficulty")?,
            version: row.try_get("version")?,
            description: row.try_get("description")?,
            notes: row.try_get("notes")?,
            status: SolutionStatus::from_str(&status)?,
            created_by: row.try_get("created_by")?,
            reviewed_by: row.try_get("reviewed_by")?,
            steps,
            images,
            created_at: decode_ts(&created_at)?,
            updated_at: decode_ts(&updated_at)?,
            id,
        })
    }
}

/// Replace the ordered step and image rows of a solution
async fn write_children(tx: &mut Transaction<'_, Sqlite>, solution: &Solution) -> KbResult<()> {
    sqlx::query("DELETE FROM solution_step WHERE solution_id = ?1")
        .bind(&solution.id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM solution_image WHERE solution_id = ?1")
        .bind(&solution.id)
        .execute(&mut **tx)
        .await?;

    for (position, content) in solution.steps.iter().enumerate() {
        sqlx::query("INSERT INTO solution_step (solution_id, position, content) VALUES (?1, ?2, ?3)")
            .bind(&solution.id)
            .bind(position as i64)
            .bind(content)
            .execute(&mut **tx)
            .await?;
    }

    for (position, image_ref) in solution.images.iter().enumerate() {
        sqlx::query(
            "INSERT INTO solution_image (solution_id, position, image_ref) VALUES (?1, ?2, ?3)",
        )
        .bind(&solution.id)
        .bind(position as i64)
        .bind(image_ref)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[async_trait]
impl SolutionRepository for SqliteStore {
    async fn category_exists(&self, category_id: &str) -> KbResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM category WHERE id = ?1")
            .bind(category_id)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn list_categories(&self) -> KbResult<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name, description FROM category ORDER BY id")
            .fetch_all(&self.db)
            .await?;

        rows.into_iter()
            .map(|row| -> KbResult<Category> {
                Ok(Category {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    async fn insert_solution(&self, solution: &Solution) -> KbResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO solution (id, category_id, title, difficulty, version, description,
                                   notes, status, created_by, reviewed_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&solution.id)
        .bind(&solution.category_id)
        .bind(&solution.title)
        .bind(&solution.difficulty)
        .bind(&solution.version)
        .bind(&solution.description)
        .bind(&solution.notes)
        .bind(solution.status.as_str())
        .bind(solution.created_by)
        .bind(solution.reviewed_by)
        .bind(encode_ts(solution.created_at))
        .bind(encode_ts(solution.updated_at))
        .execute(&mut *tx)
        .await?;

        write_children(&mut tx, solution).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn find_solution(&self, id: &str) -> KbResult<Option<Solution>> {
        let sql = format!("SELECT {} FROM solution WHERE id = ?1", SOLUTION_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.db).await?;

        match row {
            Some(row) => Ok(Some(self.parse_solution(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_solution_content(
        &self,
        solution: &Solution,
        expected: SolutionStatus,
    ) -> KbResult<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE solution
             SET category_id = ?1, title = ?2, difficulty = ?3, version = ?4,
                 description = ?5, notes = ?6, updated_at = ?7
             WHERE id = ?8 AND status = ?9",
        )
        .bind(&solution.category_id)
        .bind(&solution.title)
        .bind(&solution.difficulty)
        .bind(&solution.version)
        .bind(&solution.description)
        .bind(&solution.notes)
        .bind(encode_ts(solution.updated_at))
        .bind(&solution.id)
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        write_children(&mut tx, solution).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn change_solution_status(&self, change: &StatusChange) -> KbResult<bool> {
        let result = sqlx::query(
            "UPDATE solution
             SET status = ?1,
                 reviewed_by = COALESCE(?2, reviewed_by),
                 notes = COALESCE(?3, notes),
                 updated_at = ?4
             WHERE id = ?5 AND status = ?6",
        )
        .bind(change.to.as_str())
        .bind(change.reviewed_by)
        .bind(&change.notes)
        .bind(encode_ts(change.at))
        .bind(&change.solution_id)
        .bind(change.from.as_str())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_solution(&self, id: &str, expected: SolutionStatus) -> KbResult<bool> {
        let result = sqlx::query("DELETE FROM solution WHERE id = ?1 AND status = ?2")
            .bind(id)
            .bind(expected.as_str())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_solutions(
        &self,
        filter: &SolutionFilter,
        limit: i64,
        offset: i64,
    ) -> KbResult<Vec<Solution>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM solution WHERE 1 = 1", SOLUTION_COLUMNS));

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(created_by) = filter.created_by {
            query.push(" AND created_by = ").push_bind(created_by);
        }

        query
            .push(" ORDER BY updated_at DESC, id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build().fetch_all(&self.db).await?;

        let mut solutions = Vec::with_capacity(rows.len());
        for row in rows {
            solutions.push(self.parse_solution(row).await?);
        }

        Ok(solutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        admin::Role,
        db::account::NewAccount,
        store::AccountRepository,
        testing::memory_store,
    };
    use chrono::{Duration, Utc};

    async fn seed_owner(store: &SqliteStore) -> i64 {
        store
            .insert_account(
                NewAccount {
                    username: "author".to_string(),
                    email: "author@x.com".to_string(),
                    password_hash: "hash".to_string(),
                    created_at: Utc::now(),
                },
                Role::Admin,
            )
            .await
            .unwrap()
            .id
    }

    fn sample(id: &str, owner: i64) -> Solution {
        let now = Utc::now();
        Solution {
            id: id.to_string(),
            category_id: "crash".to_string(),
            title: "Crash on load".to_string(),
            difficulty: "easy".to_string(),
            version: "1.20".to_string(),
            description: "Game closes while loading the world".to_string(),
            notes: None,
            status: SolutionStatus::Draft,
            created_by: owner,
            reviewed_by: None,
            steps: vec!["Update drivers".to_string(), "Reinstall".to_string()],
            images: vec!["img/1.png".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_categories_are_seeded() {
        let store = memory_store().await;

        let ids: Vec<String> = store
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["crash", "launcher", "network", "other"]);
        assert!(store.category_exists("launcher").await.unwrap());
        assert!(!store.category_exists("graphics").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_preserves_step_order() {
        let store = memory_store().await;
        let owner = seed_owner(&store).await;

        store.insert_solution(&sample("s1", owner)).await.unwrap();

        let found = store.find_solution("s1").await.unwrap().unwrap();
        assert_eq!(found.steps, vec!["Update drivers", "Reinstall"]);
        assert_eq!(found.images, vec!["img/1.png"]);
        assert_eq!(found.status, SolutionStatus::Draft);
    }

    #[tokio::test]
    async fn test_status_change_is_conditional() {
        let store = memory_store().await;
        let owner = seed_owner(&store).await;
        store.insert_solution(&sample("s1", owner)).await.unwrap();

        let submit = StatusChange {
            solution_id: "s1".to_string(),
            from: SolutionStatus::Draft,
            to: SolutionStatus::PendingReview,
            reviewed_by: None,
            notes: None,
            at: Utc::now(),
        };
        assert!(store.change_solution_status(&submit).await.unwrap());
        assert!(!store.change_solution_status(&submit).await.unwrap());

        let found = store.find_solution("s1").await.unwrap().unwrap();
        assert_eq!(found.status, SolutionStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_content_update_blocked_when_status_moved() {
        let store = memory_store().await;
        let owner = seed_owner(&store).await;
        let mut solution = sample("s1", owner);
        store.insert_solution(&solution).await.unwrap();

        solution.title = "Renamed".to_string();
        solution.steps = vec!["Only step".to_string()];
        assert!(!store
            .update_solution_content(&solution, SolutionStatus::Published)
            .await
            .unwrap());
        assert!(store
            .update_solution_content(&solution, SolutionStatus::Draft)
            .await
            .unwrap());

        let found = store.find_solution("s1").await.unwrap().unwrap();
        assert_eq!(found.title, "Renamed");
        assert_eq!(found.steps, vec!["Only step"]);
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_owner() {
        let store = memory_store().await;
        let owner = seed_owner(&store).await;

        let mut older = sample("s1", owner);
        older.updated_at = Utc::now() - Duration::minutes(5);
        store.insert_solution(&older).await.unwrap();
        store.insert_solution(&sample("s2", owner)).await.unwrap();

        let mut published = sample("s3", owner);
        published.status = SolutionStatus::Published;
        store.insert_solution(&published).await.unwrap();

        let drafts = store
            .list_solutions(
                &SolutionFilter {
                    status: Some(SolutionStatus::Draft),
                    created_by: Some(owner),
                },
                10,
                0,
            )
            .await
            .unwrap();
        let ids: Vec<&str> = drafts.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);

        let all = store
            .list_solutions(&SolutionFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_cascades_children() {
        let store = memory_store().await;
        let owner = seed_owner(&store).await;
        store.insert_solution(&sample("s1", owner)).await.unwrap();

        assert!(!store
            .delete_solution("s1", SolutionStatus::Published)
            .await
            .unwrap());
        assert!(store.delete_solution("s1", SolutionStatus::Draft).await.unwrap());
        assert!(store.find_solution("s1").await.unwrap().is_none());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM solution_step")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
