use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub hashed_password: String, // Argon2 PHC string, never leaves the server
    pub created_at: OffsetDateTime,
}
