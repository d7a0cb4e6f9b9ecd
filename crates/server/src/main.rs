//! filedrop server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use filedrop_core::AppConfig;
use filedrop_server::{AppState, create_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// filedrop - resumable chunked file-upload service
#[derive(Parser, Debug)]
#[command(name = "filedropd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "FILEDROP_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,

    /// Listen port (overrides the config file)
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("filedrop v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration; everything has defaults, so both the file and
    // the env vars are optional.
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("no config file at {}, using defaults", args.config);
    }

    let mut config: AppConfig = figment
        .merge(Env::prefixed("FILEDROP_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }

    tokio::fs::create_dir_all(&config.storage.data_dir)
        .await
        .context("failed to create data directory")?;

    let state = AppState::new(config)
        .await
        .context("failed to open state store")?;
    tracing::info!(
        data_dir = %state.config.storage.data_dir.display(),
        "state store initialized"
    );

    // Re-drive assembly for uploads whose chunk set was complete when
    // the previous process stopped.
    match state.manager.recover_pending_assemblies().await {
        Ok(0) => {}
        Ok(count) => tracing::info!(count, "recovered torn completions"),
        Err(e) => tracing::warn!(error = %e, "startup recovery failed"),
    }

    let app = create_router(state.clone());

    let addr = state.config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
