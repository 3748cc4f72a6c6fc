use std::sync::Arc;

use bookmarkhub::app;
use bookmarkhub::config::{Cli, Config, DatabaseTarget};
use bookmarkhub::db::Database;
use bookmarkhub::handler::AppState;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // a missing .env file is fine, the environment may already be set
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("bookmarkhub.svc starting");

    let cfg = Config::from_env();
    let target = cfg.database.target().unwrap_or_else(|e| {
        tracing::error!(error = %format!("{e:#}"), "invalid database configuration");
        std::process::exit(1);
    });

    // Ensure the directory of a local database exists
    if let DatabaseTarget::Local(path) = &target {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::error!(error = %e, path = ?dir, "failed to create data directory");
                std::process::exit(1);
            }
        }
    }

    let db = Arc::new(Database::new(target).await.unwrap_or_else(|e| {
        tracing::error!(error = %format!("{e:#}"), "failed to setup database");
        std::process::exit(1);
    }));

    let address = format!("{}:{}", args.host, args.port);
    let app = app(AppState { db });

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("bookmarkhub.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server stopped unexpectedly");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
        }
    }

    tracing::info!("bookmarkhub.svc going off, shutdown complete");
}
