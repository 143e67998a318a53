//! Waymark - authentication gateway and activity API for the Waymark
//! browser extension

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waymark::{
    config::Args,
    db::{MemoryParticipantStore, MongoClient, MongoParticipantStore},
    experiments::ExperimentRegistry,
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("waymark={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let experiments = match ExperimentRegistry::from_config(args.experiments.as_deref()) {
        Ok(registry) => registry,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // Print startup banner
    info!("======================================");
    info!("  Waymark - extension analytics API");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Token TTL: {}s", args.token_ttl_seconds);
    info!("Experiments configured: {}", experiments.len());
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let state = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            let store = Arc::new(MongoParticipantStore::new(&client).await?);
            server::AppState::new(args.clone(), store, experiments)
        }
        Err(e) => {
            if args.dev_mode {
                warn!(
                    "MongoDB connection failed (dev mode, using in-memory store): {}",
                    e
                );
                let store = Arc::new(MemoryParticipantStore::new());
                server::AppState::new(args.clone(), store, experiments)
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    server::run(Arc::new(state)).await?;

    Ok(())
}
