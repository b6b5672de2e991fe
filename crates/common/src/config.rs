use std::str::FromStr;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (pub/sub broker)
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Address the HTTP API binds to (default: 0.0.0.0:3000)
    pub http_addr: String,

    /// Telegram bot token. The Telegram driver is disabled when unset.
    pub telegram_bot_token: Option<String>,

    /// Telegram Bot API host (default: api.telegram.org)
    pub telegram_api_host: String,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Subject line used for every outgoing email
    pub email_subject: String,

    /// Whether the Discord webhook driver is registered (default: true)
    pub discord_enabled: bool,

    /// Seconds between reconciliation sweeps (default: 600)
    pub sweeper_interval_secs: u64,

    /// Maximum concurrent resends within one sweep (default: 16)
    pub sweeper_max_concurrency: usize,

    /// Backoff after a failed pub/sub receive, in seconds (default: 5)
    pub fanout_retry_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 20)?,
            http_addr: std::env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_api_host: std::env::var("TELEGRAM_API_HOST")
                .unwrap_or_else(|_| "api.telegram.org".to_string()),
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
            email_subject: std::env::var("EMAIL_SUBJECT")
                .unwrap_or_else(|_| "Notification Service".to_string()),
            discord_enabled: parse_var("DISCORD_ENABLED", true)?,
            sweeper_interval_secs: parse_var("SWEEPER_INTERVAL_SECS", 600)?,
            sweeper_max_concurrency: parse_var("SWEEPER_MAX_CONCURRENCY", 16)?,
            fanout_retry_secs: parse_var("FANOUT_RETRY_SECS", 5)?,
        })
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            )
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_when_unset() {
        let value: u64 = parse_var("HERALD_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("HERALD_TEST_GARBAGE_VARIABLE", "not-a-number") };
        let result: anyhow::Result<u32> = parse_var("HERALD_TEST_GARBAGE_VARIABLE", 1);
        assert!(result.is_err());
    }
}
