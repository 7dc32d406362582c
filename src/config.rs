use dotenvy::dotenv;
use std::env;

/// Runtime configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub gateway_base_url: String,
    /// Outbound call timeout for payment initiation and refund commands.
    pub gateway_timeout_secs: u64,
    /// Cadence of the reconciliation sweep.
    pub sweep_interval_secs: u64,
    /// How old an unconfirmed transaction must be before the sweep
    /// force-fails it.
    pub stale_after_secs: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            gateway_base_url: env::var("GATEWAY_BASE_URL")?,
            gateway_timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()?,
            stale_after_secs: env::var("STALE_AFTER_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()?,
        })
    }
}
