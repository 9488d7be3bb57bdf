use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::warn;

use super::repo_types::User;
use crate::{error::ApiError, state::AppState};

/// The user a bearer token resolves to. Rejects with 401 otherwise.
pub struct CurrentUser(pub User);

fn credentials_error() -> ApiError {
    ApiError::Unauthorized("Could not validate credentials".into())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))?;

        let username = state.jwt.validate(token.trim()).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            credentials_error()
        })?;

        let user = state
            .users
            .get_by_username(&username)
            .await?
            .ok_or_else(|| {
                warn!(username = %username, "token subject has no user");
                credentials_error()
            })?;

        Ok(CurrentUser(user))
    }
}
