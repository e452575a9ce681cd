use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ya_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
};

/// main
///
/// Entry point: configuration, logging, persistence, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ya_portal=debug,tower_http=info,axum=trace".into());

    // 3. Log format follows APP_ENV: pretty locally, JSON in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Persistence
    // DATABASE_URL=memory runs the service on the in-memory repository.
    let repo: RepositoryState = if config.db_url == "memory" {
        tracing::warn!("Using the in-memory repository; data is lost on exit.");
        Arc::new(InMemoryRepository::new())
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.db_url)
            .await
            .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

        let repo = PostgresRepository::new(pool);
        repo.migrate()
            .await
            .expect("FATAL: Failed to apply database migrations.");
        Arc::new(repo)
    };

    // 5. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(repo, config)
        .expect("FATAL: BANNED_WORDS could not be compiled into a filter.");

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {:?}", e);
    }
}
