//! Configuration for the reservation processor.

use core_config::FromEnv;
use database::postgres::PostgresConfig;
use database::redis::RedisConfig;
use eyre::Result;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PostgresConfig,
    pub redis: RedisConfig,
    pub queue_name_reservations: String,
    pub queue_name_disk_ops: String,
    pub poll_interval_seconds: u64,
    pub visibility_timeout_seconds: u64,
    pub batch_size: usize,
    pub max_deliveries: u32,
    pub prepare_timeout_seconds: u64,
    pub reservation_max_hours: f64,
    pub extension_max_hours: f64,
    pub total_max_hours: f64,
    pub high_end_gpu_tags: HashSet<String>,
    pub max_multinode_nodes: i32,
    pub cpu_users_per_node: i32,
    pub volume_soft_delete_retention_days: i64,
    pub worker_concurrency: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_max_attempts: u32,
    pub admin_health_port: u16,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i32(key: &str, default: i32) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_high_end_gpu_tags() -> HashSet<String> {
    ["h100", "h200", "a100", "b200"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load configuration from environment variables, failing fast with a
    /// readable error if a required value is absent or unparsable.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: <PostgresConfig as FromEnv>::from_env()?,
            redis: <RedisConfig as FromEnv>::from_env()?,
            queue_name_reservations: std::env::var("QUEUE_NAME_RESERVATIONS")
                .unwrap_or_else(|_| "gpu_reservations".to_string()),
            queue_name_disk_ops: std::env::var("QUEUE_NAME_DISK_OPS")
                .unwrap_or_else(|_| "disk_operations".to_string()),
            poll_interval_seconds: env_u64("POLL_INTERVAL_SECONDS", 5),
            visibility_timeout_seconds: env_u64("VISIBILITY_TIMEOUT_SECONDS", 300),
            batch_size: env_usize("BATCH_SIZE", 1),
            max_deliveries: env_u32("MAX_DELIVERIES", 3),
            prepare_timeout_seconds: env_u64("PREPARE_TIMEOUT_SECONDS", 900),
            reservation_max_hours: env_f64("RESERVATION_MAX_HOURS", 24.0),
            extension_max_hours: env_f64("EXTENSION_MAX_HOURS", 24.0),
            total_max_hours: env_f64("TOTAL_MAX_HOURS", 48.0),
            high_end_gpu_tags: std::env::var("HIGH_END_GPU_TAGS")
                .map(|s| s.split(',').map(|t| t.trim().to_string()).collect())
                .unwrap_or_else(|_| default_high_end_gpu_tags()),
            max_multinode_nodes: env_i32("MAX_MULTINODE_NODES", 4),
            cpu_users_per_node: env_i32("CPU_USERS_PER_NODE", 3),
            volume_soft_delete_retention_days: env_i64("VOLUME_SOFT_DELETE_RETENTION_DAYS", 30),
            worker_concurrency: env_usize("WORKER_CONCURRENCY", 4),
            retry_base_delay_ms: env_u64("RETRY_BASE_DELAY_MS", 200),
            retry_max_delay_ms: env_u64("RETRY_MAX_DELAY_MS", 30_000),
            retry_max_attempts: env_u32("RETRY_MAX_ATTEMPTS", 5),
            admin_health_port: std::env::var("ADMIN_HEALTH_PORT")
                .or_else(|_| std::env::var("RP_HEALTH_PORT"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8090),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_end_gpu_tags_default_is_the_documented_four() {
        let tags = default_high_end_gpu_tags();
        for t in ["h100", "h200", "a100", "b200"] {
            assert!(tags.contains(t));
        }
        assert_eq!(tags.len(), 4);
    }

    #[test]
    fn env_u64_falls_back_to_default_on_missing_or_bad_value() {
        assert_eq!(env_u64("RP_DOES_NOT_EXIST_XYZ", 42), 42);
    }
}
