//! Configuration for the expiry & warning engine.

use core_config::FromEnv;
use database::postgres::PostgresConfig;
use eyre::Result;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PostgresConfig,
    pub expiry_tick_seconds: u64,
    pub warning_thresholds_minutes: Vec<i64>,
    pub oom_rate_limit_count: i32,
    pub oom_rate_limit_window_minutes: i64,
    pub admit_timeout_seconds: i64,
    pub prepare_timeout_seconds: i64,
    pub node_timeout_seconds: i64,
    pub admin_health_port: u16,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i32(key: &str, default: i32) -> i32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn default_warning_thresholds() -> Vec<i64> {
    vec![30, 15, 5]
}

impl Config {
    /// Load configuration from environment variables, failing fast with a
    /// readable error if a required value is absent or unparsable.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: <PostgresConfig as FromEnv>::from_env()?,
            expiry_tick_seconds: env_u64("EXPIRY_TICK_SECONDS", 60),
            warning_thresholds_minutes: std::env::var("WARNING_THRESHOLDS_MINUTES")
                .ok()
                .map(|s| s.split(',').filter_map(|t| t.trim().parse().ok()).collect())
                .filter(|v: &Vec<i64>| !v.is_empty())
                .unwrap_or_else(default_warning_thresholds),
            oom_rate_limit_count: env_i32("OOM_RATE_LIMIT", 5),
            oom_rate_limit_window_minutes: env_i64("OOM_RATE_LIMIT_WINDOW_MINUTES", 10),
            admit_timeout_seconds: env_i64("ADMIT_TIMEOUT_SECONDS", 600),
            prepare_timeout_seconds: env_i64("PREPARE_TIMEOUT_SECONDS", 900),
            node_timeout_seconds: env_i64("NODE_TIMEOUT_SECONDS", 300),
            admin_health_port: std::env::var("ADMIN_HEALTH_PORT")
                .or_else(|_| std::env::var("EE_HEALTH_PORT"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8092),
        })
    }
}
