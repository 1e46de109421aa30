use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::lifecycle::policy::ArchivalThresholds;

/// Application configuration loaded from environment variables.
///
/// Everything is optional: without `DATABASE_URL` the service runs on the in-memory
/// store, and without `ANTHROPIC_API_KEY` every match is scored by the fallback heuristic.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub anthropic_api_key: Option<String>,
    pub oracle_api_url: String,
    pub oracle_timeout: Duration,
    pub store_timeout: Duration,
    pub rank_concurrency: usize,
    pub default_top_n: usize,
    pub max_batch_size: usize,
    /// Zero disables the periodic sweep.
    pub sweep_interval: Duration,
    /// Lifecycle events are POSTed here when set; otherwise they are only logged.
    pub notify_webhook_url: Option<String>,
    pub thresholds: ArchivalThresholds,
    pub port: u16,
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            anthropic_api_key: None,
            oracle_api_url: crate::llm_client::ANTHROPIC_API_URL.to_string(),
            oracle_timeout: Duration::from_secs(20),
            store_timeout: Duration::from_secs(10),
            rank_concurrency: 8,
            default_top_n: 10,
            max_batch_size: 450,
            sweep_interval: Duration::from_secs(3600),
            notify_webhook_url: None,
            thresholds: ArchivalThresholds::default(),
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let config = Config {
            database_url: optional_env("DATABASE_URL"),
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            oracle_api_url: optional_env("ORACLE_API_URL").unwrap_or(defaults.oracle_api_url),
            oracle_timeout: Duration::from_secs(parse_env("ORACLE_TIMEOUT_SECS", 20u64)?),
            store_timeout: Duration::from_secs(parse_env("STORE_TIMEOUT_SECS", 10u64)?),
            rank_concurrency: parse_env("RANK_CONCURRENCY", defaults.rank_concurrency)?.max(1),
            default_top_n: parse_env("DEFAULT_TOP_N", defaults.default_top_n)?,
            max_batch_size: parse_env("MAX_BATCH_SIZE", defaults.max_batch_size)?,
            sweep_interval: Duration::from_secs(parse_env("SWEEP_INTERVAL_SECS", 3600u64)?),
            notify_webhook_url: optional_env("NOTIFY_WEBHOOK_URL"),
            thresholds: ArchivalThresholds {
                inactivity_days: parse_env("INACTIVITY_DAYS", defaults.thresholds.inactivity_days)?,
                rejected_hold_days: parse_env(
                    "REJECTED_HOLD_DAYS",
                    defaults.thresholds.rejected_hold_days,
                )?,
                stagnant_stage_days: parse_env(
                    "STAGNANT_STAGE_DAYS",
                    defaults.thresholds.stagnant_stage_days,
                )?,
            },
            port: parse_env("PORT", defaults.port)?,
            rust_log: optional_env("RUST_LOG").unwrap_or(defaults.rust_log),
        };
        validate_thresholds(&config.thresholds)?;
        Ok(config)
    }
}

/// Longest archival threshold accepted, in days.
const MAX_THRESHOLD_DAYS: i64 = 36_500;

fn validate_thresholds(thresholds: &ArchivalThresholds) -> Result<()> {
    for (key, days) in [
        ("INACTIVITY_DAYS", thresholds.inactivity_days),
        ("REJECTED_HOLD_DAYS", thresholds.rejected_hold_days),
        ("STAGNANT_STAGE_DAYS", thresholds.stagnant_stage_days),
    ] {
        if !(0..=MAX_THRESHOLD_DAYS).contains(&days) {
            anyhow::bail!("{key} must be between 0 and {MAX_THRESHOLD_DAYS}, got {days}");
        }
    }
    Ok(())
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
