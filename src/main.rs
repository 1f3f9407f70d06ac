use std::{sync::Arc, time::Duration};

use chrono::Utc;
use fennec_backend::{
    AppState,
    auth::ensure_default_admin,
    config::{AppConfig, Env},
    create_router,
    mail::{LogMailer, MailerState},
    repository::{MemoryStore, PostgresStore, Repository},
    session::{MemorySessionStore, PostgresSessionStore, SessionState},
    storage::{LocalDiskStorage, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// main
///
/// Entry point: configuration, logging, stores, storage, seed data, the
/// session purge task and finally the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fennec_backend=debug,tower_http=info,axum=info".into());

    // 3. Initialize Logging based on Environment
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

    // 4. Stores: Postgres when a database is configured, in-memory otherwise.
    let (repo, sessions) = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("FATAL: Database migrations failed.");

            let repo = Repository::new(Arc::new(PostgresStore::new(pool.clone())));
            let sessions = Arc::new(PostgresSessionStore::new(pool)) as SessionState;
            (repo, sessions)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores, data is lost on exit");
            let repo = Repository::new(Arc::new(MemoryStore::new()));
            let sessions = Arc::new(MemorySessionStore::new()) as SessionState;
            (repo, sessions)
        }
    };

    // 5. Storage Initialization (local upload directory)
    let disk = LocalDiskStorage::new(&config.upload_dir);
    disk.ensure_root()
        .await
        .expect("FATAL: Upload directory is not writable. Check UPLOAD_DIR.");
    let storage = Arc::new(disk) as StorageState;

    let mailer = Arc::new(LogMailer) as MailerState;

    // 6. Seed Data
    ensure_default_admin(&repo, &config)
        .await
        .expect("FATAL: Could not create the default admin user.");

    // 7. Expired sessions are also dropped lazily on lookup; this keeps the table small.
    let purge_sessions = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match purge_sessions.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "expired sessions purged"),
                Err(e) => tracing::warn!(error = %e, "session purge failed"),
            }
        }
    });

    // 8. Unified State Assembly
    let port = config.port;
    let app_state = AppState {
        repo,
        sessions,
        storage,
        mailer,
        config,
    };

    // 9. Router and Server Startup
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Could not bind the HTTP listener. Check PORT.");

    tracing::info!("HTTP server bound successfully.");
    tracing::info!("Listening on {addr}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
