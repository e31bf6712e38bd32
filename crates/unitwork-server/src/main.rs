//! Notes server binary — the entry point for the demonstration service.
//!
//! Starts an axum HTTP server with structured logging, database and session
//! layer initialization, and graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use unitwork::SessionManager;
use unitwork_server::{app, background, config, schema};
use unitwork_sqlite::SqliteProvider;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("UNITWORK_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Initialize the database and session layer
    let target = config
        .database
        .connection_target
        .clone()
        .expect("database.connection_target must be set — the server cannot start without it");

    let provider = SqliteProvider::connect(&target, &config.database.provider_options)
        .expect("failed to construct sqlite session provider — check [database] in config");

    {
        let conn = provider
            .pool()
            .get()
            .expect("failed to get database connection for schema init");
        schema::init_schema(&conn).expect("failed to initialize database schema");
    }

    let manager = Arc::new(
        SessionManager::builder()
            .provider(provider)
            .default_session_options(config.database.default_session_options.clone())
            .commit_on_exit(config.database.commit_on_exit)
            .build()
            .expect("failed to construct session manager"),
    );

    // Background retention
    tokio::spawn(background::start_purge_task(
        Arc::clone(&manager),
        config.retention.purge_after_days,
        Duration::from_secs(config.retention.check_interval_seconds),
    ));

    // Build application
    let app = app(manager);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting unitwork notes server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("unitwork notes server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
