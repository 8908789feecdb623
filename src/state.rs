use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db, config })
    }

    /// Connect to the database named by `DATABASE_URL` and apply migrations.
    /// Backs the `#[ignore]`-gated store tests; not compiled into the binary.
    #[cfg(test)]
    pub(crate) async fn for_tests() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("connect to test database");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("apply migrations");
        let config = Arc::new(AppConfig {
            database_url,
            jwt: crate::config::JwtConfig {
                secret: "test-secret".into(),
                ttl_minutes: 15,
            },
        });
        Self { db, config }
    }
}
