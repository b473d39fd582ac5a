//! Mijia hub - sensor polling scheduler and WebSocket broadcast server.
//!
//! Run with: `cargo run -p mijia-hub`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use mijia_core::HelperTransport;
use mijia_hub::{AppState, Config, PollingScheduler, ws};
use mijia_store::{DeviceRegistry, SettingsStore};

/// Mijia hub - sensor polling scheduler and WebSocket broadcast server.
#[derive(Parser, Debug)]
#[command(name = "mijia-hub")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Disable the polling scheduler (serve clients only).
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mijia_hub=info".parse()?)
                .add_directive("mijia_core=info".parse()?)
                .add_directive("mijia_store=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    // Runtime settings are self-healing; a missing or corrupt file becomes
    // the defaults.
    let settings_store = SettingsStore::new(&config.storage.settings_file);
    let settings = settings_store.load()?;

    // The device registry is not: corruption here is fatal, since starting
    // over would orphan the history files.
    let registry = DeviceRegistry::new(config.storage.data_dir.join(&settings.sensor_file));
    let devices = registry.load()?;
    info!("{} device(s) loaded from storage", devices.len());

    let state = AppState::new(config.clone(), settings, devices);

    // Start the polling scheduler
    if args.no_scheduler {
        info!("polling scheduler disabled");
    } else {
        let transport = Arc::new(HelperTransport::new(
            &config.helpers.discover,
            &config.helpers.read,
        ));
        let scheduler = PollingScheduler::new(Arc::clone(&state), transport);
        tokio::spawn(async move {
            if let Err(e) = scheduler.run().await {
                error!("polling scheduler stopped: {e}");
                std::process::exit(1);
            }
        });
    }

    // Build the router
    let app = Router::new()
        .merge(ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr: SocketAddr = config.server.bind.parse()?;
    info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
