//! Configuration for waymark
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// Waymark - authentication gateway and activity API for the Waymark
/// browser extension
#[derive(Parser, Debug, Clone)]
#[command(name = "waymark")]
#[command(about = "Authentication gateway and activity API for the Waymark browser extension")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "waymark")]
    pub mongodb_db: String,

    /// Secret for session token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Session token expiry in seconds
    #[arg(long, env = "TOKEN_TTL_SECONDS", default_value = "3600")]
    pub token_ttl_seconds: u64,

    /// Experiment definitions as a JSON map of name to group list,
    /// e.g. {"onboarding_tips": ["tips_on", "tips_off", "control"]}
    #[arg(long, env = "EXPERIMENTS")]
    pub experiments: Option<String>,

    /// Enable development mode (in-memory store fallback, default secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective token signing secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if self.token_ttl_seconds == 0 {
            return Err("TOKEN_TTL_SECONDS must be positive".to_string());
        }

        Ok(())
    }
}
