use crate::config::AppConfig;
use crate::db;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = db::connect(&config.database_url, config.max_connections).await?;
        db::migrate(&db).await?;

        Ok(Self { db, config })
    }

    #[cfg(test)]
    pub async fn fake() -> Self {
        use crate::config::SessionConfig;

        let db = db::connect_in_memory()
            .await
            .expect("in-memory database should open");

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            session: SessionConfig {
                cookie_name: "session".into(),
                ttl_minutes: 60,
                secure_cookie: false,
            },
        });

        Self { db, config }
    }
}
