pub mod config;
pub mod database;
pub mod models;
pub mod controllers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        Ok(Arc::new(Self { db, config }))
    }
}
