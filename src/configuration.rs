use std::collections::HashMap;
use std::time::Duration;
use anyhow::{Context, Result};

pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub sql_logging: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    /// Upper bound on any single service operation; `None` leaves it to the caller.
    pub operation_timeout: Option<Duration>,
    pub log_filter: String,
}

impl Settings {
    /// Reads settings from the process environment, after `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let url = vars
            .get("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .cloned()
            .context("DATABASE_URL must be set")?;

        Ok(Self {
            database: DatabaseSettings {
                url,
                max_connections: parse_or(vars, "DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_or(vars, "DATABASE_MIN_CONNECTIONS", 5)?,
                connect_timeout: Duration::from_secs(parse_or(vars, "DATABASE_CONNECT_TIMEOUT_SECS", 8)?),
                sql_logging: parse_or(vars, "DATABASE_SQL_LOGGING", false)?,
            },
            operation_timeout: parse_opt::<u64>(vars, "KITE_OPERATION_TIMEOUT_SECS")?.map(Duration::from_secs),
            log_filter: vars
                .get("RUST_LOG")
                .cloned()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}

fn parse_opt<T>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(None),
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(vars, key)?.unwrap_or(default))
}
