use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use auth::{
    AppState,
    repositories::{MemoryStore, PgSessionRepository, PgUserRepository},
    routes,
    session::spawn_sweeper,
    settings::{Settings, StoreBackend},
};
use common::{database, error::DatabaseError};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting authentication service");

    let settings = Settings::from_env()?;

    let app_state = match settings.store {
        StoreBackend::Postgres => {
            let db_config = database::DatabaseConfig::from_env()?;
            let pool = database::init_pool(&db_config).await?;

            // Check database connectivity
            if database::health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            info!("Database migrations applied");

            let timeout = db_config.connection_timeout;
            AppState::new(
                Arc::new(PgUserRepository::new(pool.clone(), timeout)),
                Arc::new(PgSessionRepository::new(pool.clone(), timeout)),
                settings.clone(),
                Some(pool),
            )
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; users and sessions are lost on restart");
            let store = MemoryStore::new();
            AppState::new(
                Arc::new(store.clone()),
                Arc::new(store),
                settings.clone(),
                None,
            )
        }
    };

    let _sweeper = spawn_sweeper(app_state.sessions.clone(), settings.sweep_interval());

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!("Authentication service listening on {}", settings.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
