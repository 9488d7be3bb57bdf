use serde::{Deserialize, Deserializer};

use super::repo_types::{HabitChanges, NewHabit};
use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// A field in a partial update: omitted, explicitly `null`, or a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Missing,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Missing
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        // Only reached when the key is present; absent keys use `Default`.
        Ok(match Option::<T>::deserialize(d)? {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        })
    }
}

impl<T> Patch<T> {
    /// `None` when omitted, `Some(None)` for an explicit null.
    pub fn into_change(self) -> Option<Option<T>> {
        match self {
            Patch::Missing => None,
            Patch::Null => Some(None),
            Patch::Value(v) => Some(Some(v)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HabitCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HabitUpdate {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
}

fn clean_name(name: String) -> Result<String, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("Habit name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

impl TryFrom<HabitCreate> for NewHabit {
    type Error = ApiError;

    fn try_from(body: HabitCreate) -> Result<Self, Self::Error> {
        Ok(NewHabit {
            name: clean_name(body.name)?,
            description: body.description,
        })
    }
}

impl TryFrom<HabitUpdate> for HabitChanges {
    type Error = ApiError;

    fn try_from(body: HabitUpdate) -> Result<Self, Self::Error> {
        let name = match body.name {
            Patch::Missing => None,
            Patch::Null => {
                return Err(ApiError::BadRequest("Habit name must not be null".into()))
            }
            Patch::Value(name) => Some(clean_name(name)?),
        };
        Ok(HabitChanges {
            name,
            description: body.description.into_change(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Pagination {
    /// Returns `(skip, limit)` as requested; only negative values are rejected.
    pub fn bounds(&self) -> Result<(i64, i64), ApiError> {
        if self.skip < 0 || self.limit < 0 {
            return Err(ApiError::BadRequest("skip and limit must not be negative".into()));
        }
        Ok((self.skip, self.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_omitted_from_null() {
        let omitted: HabitUpdate = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(omitted.name, Patch::Missing);
        assert_eq!(omitted.description, Patch::Missing);

        let cleared: HabitUpdate = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.name, Patch::Missing);
        assert_eq!(cleared.description, Patch::Null);

        let set: HabitUpdate =
            serde_json::from_str(r#"{"name": "Read", "description": ""}"#).unwrap();
        assert_eq!(set.name, Patch::Value("Read".into()));
        assert_eq!(set.description, Patch::Value(String::new()));
    }

    #[test]
    fn changes_from_update() {
        let changes = HabitChanges::try_from(HabitUpdate {
            name: Patch::Missing,
            description: Patch::Null,
        })
        .unwrap();
        assert_eq!(changes.name, None);
        assert_eq!(changes.description, Some(None));

        let changes = HabitChanges::try_from(HabitUpdate {
            name: Patch::Value("  Run ".into()),
            description: Patch::Missing,
        })
        .unwrap();
        assert_eq!(changes.name.as_deref(), Some("Run"));
        assert_eq!(changes.description, None);

        assert!(HabitChanges::try_from(HabitUpdate::default()).unwrap().is_empty());
    }

    #[test]
    fn null_or_blank_name_is_rejected() {
        let err = HabitChanges::try_from(HabitUpdate {
            name: Patch::Null,
            description: Patch::Missing,
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = NewHabit::try_from(HabitCreate {
            name: "   ".into(),
            description: None,
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn pagination_defaults_and_bounds() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p.bounds().unwrap(), (0, 100));

        let p = Pagination { skip: 5, limit: 1000 };
        assert_eq!(p.bounds().unwrap(), (5, 1000));

        let p = Pagination { skip: 0, limit: -3 };
        assert!(p.bounds().is_err());

        let p = Pagination { skip: -1, limit: 10 };
        assert!(p.bounds().is_err());
    }
}
