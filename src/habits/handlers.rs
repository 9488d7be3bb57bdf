use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{
    dto::{HabitCreate, HabitUpdate, Pagination},
    repo_types::{Habit, HabitChanges, NewHabit},
    services::{not_found, owned_habit},
};
use crate::{auth::extractors::CurrentUser, error::ApiError, state::AppState};

pub fn habit_routes() -> Router<AppState> {
    Router::new()
        .route("/habits", get(list_habits).post(create_habit))
        .route("/habits/", get(list_habits).post(create_habit))
        .route("/habits/:habit_id", put(update_habit).delete(delete_habit))
        .route("/habits/:habit_id/toggle", put(toggle_habit))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn create_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<HabitCreate>,
) -> Result<Json<Habit>, ApiError> {
    let habit = state.habits.create(NewHabit::try_from(body)?, user.id).await?;
    info!(habit_id = habit.id, "habit created");
    Ok(Json(habit))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn list_habits(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<Habit>>, ApiError> {
    let (skip, limit) = p.bounds()?;
    let habits = state.habits.list_by_owner(user.id, skip, limit).await?;
    Ok(Json(habits))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn toggle_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(habit_id): Path<i64>,
) -> Result<Json<Habit>, ApiError> {
    owned_habit(state.habits.as_ref(), habit_id, &user, "modify").await?;

    let today = OffsetDateTime::now_utc().date();
    let habit = state
        .habits
        .toggle_completion(habit_id, today)
        .await?
        .ok_or_else(not_found)?;
    info!(habit_id, completed = ?habit.last_completed_at, "habit toggled");
    Ok(Json(habit))
}

#[instrument(skip(state, user, body), fields(user_id = user.id))]
pub async fn update_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(habit_id): Path<i64>,
    Json(body): Json<HabitUpdate>,
) -> Result<Json<Habit>, ApiError> {
    let current = owned_habit(state.habits.as_ref(), habit_id, &user, "edit").await?;

    let changes = HabitChanges::try_from(body)?;
    if changes.is_empty() {
        return Ok(Json(current));
    }
    let habit = state
        .habits
        .update(habit_id, changes)
        .await?
        .ok_or_else(not_found)?;
    info!(habit_id, "habit updated");
    Ok(Json(habit))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn delete_habit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(habit_id): Path<i64>,
) -> Result<Json<Habit>, ApiError> {
    owned_habit(state.habits.as_ref(), habit_id, &user, "delete").await?;

    let habit = state.habits.delete(habit_id).await?.ok_or_else(not_found)?;
    info!(habit_id, "habit deleted");
    Ok(Json(habit))
}
