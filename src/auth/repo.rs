use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::auth::repo_types::User;
use crate::error::ApiError;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<User>, ApiError>;
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, ApiError>;
    /// Stores an already hashed password. A taken username is a `Conflict`.
    async fn insert(&self, username: &str, hashed_password: &str) -> Result<User, ApiError>;
}

fn username_taken() -> ApiError {
    ApiError::Conflict("Username already registered".into())
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Option<User>, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, hashed_password, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, hashed_password, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(user)
    }

    #[instrument(skip(self, hashed_password))]
    async fn insert(&self, username: &str, hashed_password: &str) -> Result<User, ApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, hashed_password)
            VALUES ($1, $2)
            RETURNING id, username, hashed_password, created_at
            "#,
        )
        .bind(username)
        .bind(hashed_password)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    warn!(username = %username, "username already registered");
                    return username_taken();
                }
            }
            ApiError::from(e)
        })?;
        debug!(user_id = user.id, "user inserted");
        Ok(user)
    }
}

/// In-memory user store for development without a database and for tests.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: i64) -> Result<Option<User>, ApiError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert(&self, username: &str, hashed_password: &str) -> Result<User, ApiError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == username) {
            return Err(username_taken());
        }
        let user = User {
            id: users.last().map_or(1, |u| u.id + 1),
            username: username.to_string(),
            hashed_password: hashed_password.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookups_by_id_and_username() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.insert("alice", "hash-a").await.unwrap();
        let bob = repo.insert("bob", "hash-b").await.unwrap();
        assert_ne!(alice.id, bob.id);

        let found = repo.get(bob.id).await.unwrap().expect("bob by id");
        assert_eq!(found.username, "bob");
        let found = repo.get_by_username("alice").await.unwrap().expect("alice by name");
        assert_eq!(found.id, alice.id);
        assert_eq!(found.hashed_password, "hash-a");

        assert!(repo.get(999).await.unwrap().is_none());
        assert!(repo.get_by_username("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let repo = InMemoryUserRepository::new();
        repo.insert("alice", "h1").await.unwrap();
        let err = repo.insert("alice", "h2").await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(repo.get_by_username("alice").await.unwrap().unwrap().hashed_password, "h1");
    }
}
