//! `inventd`: the install record store server.
//!
//! Usage:
//!   inventd [-c <context-name-or-path>] [--listen <addr>]
//!
//! The context name resolves to `/etc/invent/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use clap::Parser;
use invent_core::{Module, ServiceConfig};
use tracing::info;

/// Install record store server.
#[derive(Parser, Debug)]
#[command(name = "inventd", about = "Install record store server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Listen address (overrides the config file).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(name) => {
            let path = ServiceConfig::resolve_path(name);
            let config = ServiceConfig::load(&path)?;
            init_tracing(&config.log);
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => {
            let config = ServiceConfig::default();
            init_tracing(&config.log);
            config
        }
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    if let Some(dir) = &config.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    let sqlite_path = config.resolve_sqlite_path();
    let sql: Arc<dyn invent_sql::SQLStore> = Arc::new(
        invent_sql::SqliteStore::open(&sqlite_path)
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    info!("SQL store at {}", sqlite_path.display());

    let install_module = install::InstallModule::new(sql)?;
    info!("{} module initialized", install_module.name());

    let app = Router::new()
        .route("/health", get(health))
        .merge(install_module.routes());

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("inventd listening on {}", config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` wins over the config file's `log` directive.
fn init_tracing(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .init();
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
