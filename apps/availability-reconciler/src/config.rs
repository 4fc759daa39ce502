//! Configuration for the availability reconciler.

use core_config::FromEnv;
use database::postgres::PostgresConfig;
use eyre::Result;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database: PostgresConfig,
    pub availability_reconcile_seconds: u64,
    pub high_end_gpu_tags: HashSet<String>,
    pub max_multinode_nodes: i32,
    pub cpu_users_per_node: i32,
    /// Prefix for the `<prefix>-gpu-nodes-<tag>*` auto-scaling-group name
    /// pattern Phase A matches against.
    pub asg_name_prefix: String,
    /// Cloud-side tag key/value identifying a volume as belonging to this
    /// system, used to enumerate volumes for Phase B.
    pub volume_tag_key: String,
    pub volume_tag_value: String,
    pub volume_soft_delete_retention_days: i64,
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

fn default_high_end_gpu_tags() -> HashSet<String> {
    ["h100", "h200", "a100", "b200"].into_iter().map(str::to_string).collect()
}

impl Config {
    /// Load configuration from environment variables, failing fast with a
    /// readable error if a required value is absent or unparsable.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: <PostgresConfig as FromEnv>::from_env()?,
            availability_reconcile_seconds: env_u64("AVAILABILITY_RECONCILE_SECONDS", 300),
            high_end_gpu_tags: std::env::var("HIGH_END_GPU_TAGS")
                .map(|s| s.split(',').map(|t| t.trim().to_string()).collect())
                .unwrap_or_else(|_| default_high_end_gpu_tags()),
            max_multinode_nodes: env_i32("MAX_MULTINODE_NODES", 4),
            cpu_users_per_node: env_i32("CPU_USERS_PER_NODE", 3),
            asg_name_prefix: std::env::var("ASG_NAME_PREFIX").unwrap_or_else(|_| "cluster".to_string()),
            volume_tag_key: std::env::var("VOLUME_TAG_KEY").unwrap_or_else(|_| "gpu-dev-server".to_string()),
            volume_tag_value: std::env::var("VOLUME_TAG_VALUE").unwrap_or_else(|_| "managed".to_string()),
            volume_soft_delete_retention_days: env_i64("VOLUME_SOFT_DELETE_RETENTION_DAYS", 30),
            admin_health_port: std::env::var("ADMIN_HEALTH_PORT")
                .or_else(|_| std::env::var("AR_HEALTH_PORT"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8091),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_end_gpu_tags_default_matches_spec_set() {
        let tags = default_high_end_gpu_tags();
        for t in ["h100", "h200", "a100", "b200"] {
            assert!(tags.contains(t));
        }
        assert_eq!(tags.len(), 4);
    }

    #[test]
    fn env_u64_falls_back_to_default_on_missing_or_bad_value() {
        assert_eq!(env_u64("AR_DOES_NOT_EXIST_XYZ", 300), 300);
    }
}
