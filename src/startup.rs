use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub gateway: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.gateway
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Gateway Connectivity:  {}", status(self.gateway));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✅ OK"
    } else {
        "❌ FAIL"
    }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        gateway: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    if let Err(e) = validate_gateway(&config.gateway_base_url).await {
        report.gateway = false;
        report.errors.push(format!("Gateway: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.gateway_base_url.is_empty() {
        anyhow::bail!("GATEWAY_BASE_URL is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.gateway_timeout_secs == 0 {
        anyhow::bail!("GATEWAY_TIMEOUT_SECS must be greater than 0");
    }
    if config.stale_after_secs <= 0 {
        anyhow::bail!("STALE_AFTER_SECS must be greater than 0");
    }

    url::Url::parse(&config.gateway_base_url).context("GATEWAY_BASE_URL is not a valid URL")?;

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_gateway(gateway_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    // Any HTTP response counts as reachable; the gateway has no health
    // endpoint we can rely on.
    client
        .get(gateway_url)
        .send()
        .await
        .context("Failed to connect to gateway")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost:5432/test".to_string(),
            gateway_base_url: "https://gateway.example.test".to_string(),
            gateway_timeout_secs: 5,
            sweep_interval_secs: 3600,
            stale_after_secs: 900,
        }
    }

    #[test]
    fn test_validate_env_vars_empty_database_url() {
        let mut config = base_config();
        config.database_url = String::new();

        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_invalid_gateway_url() {
        let mut config = base_config();
        config.gateway_base_url = "not-a-url".to_string();

        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_rejects_zero_staleness() {
        let mut config = base_config();
        config.stale_after_secs = 0;

        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_accepts_valid_config() {
        assert!(validate_env_vars(&base_config()).is_ok());
    }
}
