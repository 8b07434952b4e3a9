/// Configuration module for managing environment variables and API keys
///
/// Loads and validates all configuration values from environment variables
/// (typically from a .env file).

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the deals API
    pub deals_api_url: String,

    /// Optional bearer token for the deals API
    pub deals_api_key: Option<String>,

    /// Seconds between worker ticks
    pub poll_interval_secs: u64,

    /// Optional JSON file seeding the search registry
    pub searches_file: Option<String>,

    /// Port for the status HTTP server
    pub http_port: u16,

    /// Evaluate schedules without running searches or stamping results
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if any required environment variable is missing
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Ok(Config {
            deals_api_url: env::var("DEALS_API_URL").context("DEALS_API_URL must be set")?,

            deals_api_key: env::var("DEALS_API_KEY").ok().filter(|key| !key.is_empty()),

            poll_interval_secs: env::var("POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),

            searches_file: env::var("SEARCHES_FILE").ok().filter(|path| !path.is_empty()),

            http_port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            dry_run: env::var("DRY_RUN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        })
    }
}
