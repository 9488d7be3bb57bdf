use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

/// Habit record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Habit {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub last_completed_at: Option<Date>, // serialized as YYYY-MM-DD
}

impl Habit {
    /// Same-day toggle: clears today's completion, otherwise marks today.
    pub fn toggled(&self, today: Date) -> Option<Date> {
        if self.last_completed_at == Some(today) {
            None
        } else {
            Some(today)
        }
    }
}

/// Validated fields for a new habit.
#[derive(Debug, Clone)]
pub struct NewHabit {
    pub name: String,
    pub description: Option<String>,
}

/// Validated sparse update. `None` leaves the column untouched;
/// `Some(None)` on `description` clears it.
#[derive(Debug, Clone, Default)]
pub struct HabitChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl HabitChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }

    pub fn apply_to(self, habit: &mut Habit) {
        if let Some(name) = self.name {
            habit.name = name;
        }
        if let Some(description) = self.description {
            habit.description = description;
        }
    }
}
