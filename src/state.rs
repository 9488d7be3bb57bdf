use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{InMemoryUserRepository, PgUserRepository, UserRepository},
    },
    config::AppConfig,
    db,
    habits::repo::{HabitRepository, InMemoryHabitRepository, PgHabitRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub habits: Arc<dyn HabitRepository>,
    pub jwt: JwtKeys,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let Some(database_url) = config.database_url.as_deref() else {
            warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
            return Ok(Self::in_memory(config));
        };

        let pool = db::connect(database_url, config.max_connections).await?;
        db::migrate(&pool).await;
        info!("connected to database");

        let jwt = JwtKeys::from_config(&config.jwt);

        Ok(Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            habits: Arc::new(PgHabitRepository::new(pool)),
            jwt,
            config,
        })
    }

    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            habits: Arc::new(InMemoryHabitRepository::new()),
            jwt: JwtKeys::from_config(&config.jwt),
            config,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                algorithm: jsonwebtoken::Algorithm::HS256,
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            cors_origins: Vec::new(),
        });
        Self::in_memory(config)
    }
}
