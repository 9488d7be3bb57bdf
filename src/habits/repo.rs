use async_trait::async_trait;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::repo_types::{Habit, HabitChanges, NewHabit};
use crate::error::ApiError;

#[async_trait]
pub trait HabitRepository: Send + Sync {
    /// Habits of `owner_id` in insertion order, after skipping `skip`, at most `limit`.
    async fn list_by_owner(
        &self,
        owner_id: i64,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Habit>, ApiError>;
    async fn create(&self, habit: NewHabit, owner_id: i64) -> Result<Habit, ApiError>;
    async fn get(&self, id: i64) -> Result<Option<Habit>, ApiError>;
    async fn update(&self, id: i64, changes: HabitChanges) -> Result<Option<Habit>, ApiError>;
    /// Removes the habit and returns what it looked like before deletion.
    async fn delete(&self, id: i64) -> Result<Option<Habit>, ApiError>;
    async fn toggle_completion(&self, id: i64, today: Date) -> Result<Option<Habit>, ApiError>;
}

const HABIT_COLUMNS: &str = "id, owner_id, name, description, created_at, last_completed_at";

pub struct PgHabitRepository {
    pool: PgPool,
}

impl PgHabitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HabitRepository for PgHabitRepository {
    #[instrument(skip(self))]
    async fn list_by_owner(
        &self,
        owner_id: i64,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Habit>, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, Habit>(&format!(
            r#"
            SELECT {HABIT_COLUMNS}
            FROM habits
            WHERE owner_id = $1
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self, habit))]
    async fn create(&self, habit: NewHabit, owner_id: i64) -> Result<Habit, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, Habit>(&format!(
            r#"
            INSERT INTO habits (owner_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING {HABIT_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(&habit.name)
        .bind(&habit.description)
        .fetch_one(&mut *conn)
        .await?;
        debug!(habit_id = row.id, "habit inserted");
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Option<Habit>, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, Habit>(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: i64, changes: HabitChanges) -> Result<Option<Habit>, ApiError> {
        let (set_name, name) = match changes.name {
            Some(name) => (true, Some(name)),
            None => (false, None),
        };
        let (set_description, description) = match changes.description {
            Some(description) => (true, description),
            None => (false, None),
        };

        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, Habit>(&format!(
            r#"
            UPDATE habits
               SET name        = CASE WHEN $2 THEN $3 ELSE name END,
                   description = CASE WHEN $4 THEN $5 ELSE description END
             WHERE id = $1
            RETURNING {HABIT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(set_name)
        .bind(name)
        .bind(set_description)
        .bind(description)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<Option<Habit>, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, Habit>(&format!(
            "DELETE FROM habits WHERE id = $1 RETURNING {HABIT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn toggle_completion(&self, id: i64, today: Date) -> Result<Option<Habit>, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, Habit>(&format!(
            r#"
            UPDATE habits
               SET last_completed_at = CASE
                       WHEN last_completed_at = $2 THEN NULL
                       ELSE $2
                   END
             WHERE id = $1
            RETURNING {HABIT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(today)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row)
    }
}

/// In-memory habit store for development without a database and for tests.
#[derive(Default)]
pub struct InMemoryHabitRepository {
    inner: RwLock<HabitTable>,
}

#[derive(Default)]
struct HabitTable {
    next_id: i64,
    rows: Vec<Habit>, // insertion order
}

impl InMemoryHabitRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HabitRepository for InMemoryHabitRepository {
    async fn list_by_owner(
        &self,
        owner_id: i64,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Habit>, ApiError> {
        let table = self.inner.read().await;
        Ok(table
            .rows
            .iter()
            .filter(|h| h.owner_id == owner_id)
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn create(&self, habit: NewHabit, owner_id: i64) -> Result<Habit, ApiError> {
        let mut table = self.inner.write().await;
        table.next_id += 1;
        let row = Habit {
            id: table.next_id,
            owner_id,
            name: habit.name,
            description: habit.description,
            created_at: OffsetDateTime::now_utc(),
            last_completed_at: None,
        };
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: i64) -> Result<Option<Habit>, ApiError> {
        let table = self.inner.read().await;
        Ok(table.rows.iter().find(|h| h.id == id).cloned())
    }

    async fn update(&self, id: i64, changes: HabitChanges) -> Result<Option<Habit>, ApiError> {
        let mut table = self.inner.write().await;
        let Some(habit) = table.rows.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };
        changes.apply_to(habit);
        Ok(Some(habit.clone()))
    }

    async fn delete(&self, id: i64) -> Result<Option<Habit>, ApiError> {
        let mut table = self.inner.write().await;
        let Some(pos) = table.rows.iter().position(|h| h.id == id) else {
            return Ok(None);
        };
        Ok(Some(table.rows.remove(pos)))
    }

    async fn toggle_completion(&self, id: i64, today: Date) -> Result<Option<Habit>, ApiError> {
        let mut table = self.inner.write().await;
        let Some(habit) = table.rows.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };
        habit.last_completed_at = habit.toggled(today);
        Ok(Some(habit.clone()))
    }
}
