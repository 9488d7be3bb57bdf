use tracing::warn;

use super::{repo::HabitRepository, repo_types::Habit};
use crate::{auth::repo_types::User, error::ApiError};

pub(crate) fn not_found() -> ApiError {
    ApiError::NotFound("Habit not found".into())
}

/// Loads a habit the caller may modify. Existence is checked before
/// ownership, so a missing id is always 404.
pub async fn owned_habit(
    habits: &dyn HabitRepository,
    habit_id: i64,
    user: &User,
    action: &str,
) -> Result<Habit, ApiError> {
    let habit = habits.get(habit_id).await?.ok_or_else(not_found)?;
    if habit.owner_id != user.id {
        warn!(habit_id, owner_id = habit.owner_id, user_id = user.id, action, "not the owner");
        return Err(ApiError::Forbidden(format!(
            "Not authorized to {action} this habit"
        )));
    }
    Ok(habit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::habits::{repo::InMemoryHabitRepository, repo_types::NewHabit};
    use time::OffsetDateTime;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{id}"),
            hashed_password: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn owner_gets_habit() {
        let repo = InMemoryHabitRepository::new();
        let habit = repo
            .create(NewHabit { name: "Read".into(), description: None }, 1)
            .await
            .unwrap();
        let found = owned_habit(&repo, habit.id, &user(1), "edit").await.unwrap();
        assert_eq!(found, habit);
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let repo = InMemoryHabitRepository::new();
        let habit = repo
            .create(NewHabit { name: "Read".into(), description: None }, 1)
            .await
            .unwrap();
        let err = owned_habit(&repo, habit.id, &user(2), "delete").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(msg) if msg.contains("delete")));
    }

    #[tokio::test]
    async fn missing_habit_is_not_found_for_anyone() {
        let repo = InMemoryHabitRepository::new();
        let err = owned_habit(&repo, 7, &user(2), "modify").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn habit_removed_after_ownership_check_reads_as_not_found() {
        let repo = InMemoryHabitRepository::new();
        let habit = repo
            .create(NewHabit { name: "Read".into(), description: None }, 1)
            .await
            .unwrap();
        owned_habit(&repo, habit.id, &user(1), "modify").await.unwrap();

        // Another request deletes it before this one mutates.
        repo.delete(habit.id).await.unwrap();

        let today = time::macros::date!(2024 - 05 - 01);
        let err = repo
            .toggle_completion(habit.id, today)
            .await
            .unwrap()
            .ok_or_else(not_found)
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = owned_habit(&repo, habit.id, &user(1), "modify").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
