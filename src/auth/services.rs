use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    password::{hash_password, verify_password},
    repo::UserRepository,
    repo_types::User,
};
use crate::error::ApiError;

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^\S{1,64}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn bad_credentials() -> ApiError {
    ApiError::Unauthorized("Incorrect username or password".into())
}

/// Hashes the password and stores a new user. The username must be free.
pub async fn register_user(
    users: &dyn UserRepository,
    username: &str,
    password: &str,
) -> Result<User, ApiError> {
    let username = username.trim();
    if !is_valid_username(username) {
        return Err(ApiError::BadRequest("Invalid username".into()));
    }
    if password.is_empty() {
        return Err(ApiError::BadRequest("Password must not be empty".into()));
    }

    if users.get_by_username(username).await?.is_some() {
        warn!(username = %username, "username already registered");
        return Err(ApiError::Conflict("Username already registered".into()));
    }

    let hash = hash_password(password)?;
    let user = users.insert(username, &hash).await?;
    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Returns the user only when the username exists and the password matches.
pub async fn authenticate(
    users: &dyn UserRepository,
    username: &str,
    password: &str,
) -> Result<User, ApiError> {
    let Some(user) = users.get_by_username(username.trim()).await? else {
        warn!(username = %username, "login unknown username");
        return Err(bad_credentials());
    };

    if !verify_password(password, &user.hashed_password)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(bad_credentials());
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::InMemoryUserRepository;

    #[test]
    fn username_rules() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("a.b-c_d"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("two words"));
        assert!(!is_valid_username(&"x".repeat(65)));
    }

    #[tokio::test]
    async fn register_hashes_password() {
        let users = InMemoryUserRepository::new();
        let user = register_user(&users, "  alice ", "pw").await.unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.hashed_password, "pw");
        assert!(verify_password("pw", &user.hashed_password).unwrap());
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let users = InMemoryUserRepository::new();
        register_user(&users, "alice", "pw").await.unwrap();
        let err = register_user(&users, "alice", "other").await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_rejects_blank_input() {
        let users = InMemoryUserRepository::new();
        assert!(matches!(
            register_user(&users, "   ", "pw").await.unwrap_err(),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            register_user(&users, "alice", "").await.unwrap_err(),
            ApiError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn authenticate_checks_password() {
        let users = InMemoryUserRepository::new();
        let alice = register_user(&users, "alice", "right").await.unwrap();

        let ok = authenticate(&users, "alice", "right").await.unwrap();
        assert_eq!(ok.id, alice.id);

        assert!(matches!(
            authenticate(&users, "alice", "wrong").await.unwrap_err(),
            ApiError::Unauthorized(_)
        ));
        assert!(matches!(
            authenticate(&users, "nobody", "right").await.unwrap_err(),
            ApiError::Unauthorized(_)
        ));
    }
}
