//! Learning Trails Daemon
//!
//! Serves the learning-platform API: trails, categories, modules, challenges
//! and per-user progress with category gating.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! learning-trails
//!
//! # Start with custom config
//! learning-trails --config /path/to/config.toml
//!
//! # Start with custom HTTP port and storage directory
//! learning-trails --http-port 8080 --storage-dir /data/trails
//! ```
//!
//! Logging is controlled through `RUST_LOG` (default `learning_trails=info`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use learning_trails::services::events::spawn_logging_listener;
use learning_trails::{Config, HttpServer, LearningDb, Services};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "learning-trails")]
#[command(about = "Learning trails API with progress gating")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "LEARNING_TRAILS_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory for the SQLite database
    #[arg(long, env = "LEARNING_TRAILS_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "LEARNING_TRAILS_HTTP_PORT")]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("learning_trails=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }

    info!(
        storage_dir = %config.storage_dir.display(),
        http_port = config.http_port,
        pass_percentage = config.pass_percentage,
        "Starting learning-trails"
    );

    // Ensure storage directory exists
    tokio::fs::create_dir_all(&config.storage_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(LearningDb::open(&config.storage_dir)?);
    let services = Arc::new(Services::new(db.clone(), &config));
    let listener = spawn_logging_listener(services.events.clone());

    let http_addr: SocketAddr = format!("{}:{}", config.bind_address, config.http_port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.http_port))?;
    let http_server = Arc::new(
        HttpServer::new(services.clone(), http_addr).with_cors_origin(&config.cors_allow_origin)?,
    );

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET  /health                     - Health check");
    info!("  GET  /trails/{{id}}/progress       - Progress with category gating");
    info!("  POST /categories/reorder         - Replace a trail's category order");
    info!("  POST /challenges/{{id}}/respond    - Score a challenge response");
    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    listener.abort();

    if let Ok(stats) = db.stats() {
        info!(
            trails = stats.trail_count,
            categories = stats.category_count,
            users = stats.user_count,
            "Final database stats"
        );
    }

    Ok(())
}
