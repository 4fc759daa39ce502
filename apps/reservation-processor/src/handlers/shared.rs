//! Shared handler state and small helpers used across `reserve`/`mutate`/`disk`.

use std::sync::Arc;

use cloud_adapter::CloudAdapter;
use cluster_gateway::ClusterGateway;
use domain_audit::AuditRepository;
use domain_gpu_types::GpuTypeRepository;
use domain_reservations::ReservationRepository;
use domain_volumes::VolumeRepository;
use sea_orm::DatabaseConnection;
use sha2::{Digest, Sha256};

use crate::config::Config;

/// Everything a handler needs: the pool (for opening transactions) plus one
/// trait object per collaborator, so tests can substitute mocks for any of
/// them independently.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub reservations: Arc<dyn ReservationRepository>,
    pub volumes: Arc<dyn VolumeRepository>,
    pub gpu_types: Arc<dyn GpuTypeRepository>,
    pub cluster: Arc<dyn ClusterGateway>,
    pub cloud: Arc<dyn CloudAdapter>,
    pub audit: Arc<dyn AuditRepository>,
    pub config: Arc<Config>,
}

/// A deterministic, short, DNS-label-safe pod name derived from a
/// reservation id, so repeated deliveries of the same message resolve to
/// the same pod instead of creating duplicates.
pub fn pod_name_for(reservation_id: &str) -> String {
    let digest = Sha256::digest(reservation_id.as_bytes());
    let short: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("rsv-{short}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_name_is_deterministic() {
        assert_eq!(pod_name_for("abc"), pod_name_for("abc"));
    }

    #[test]
    fn pod_name_differs_across_reservations() {
        assert_ne!(pod_name_for("abc"), pod_name_for("def"));
    }

    #[test]
    fn pod_name_is_dns_label_safe() {
        let name = pod_name_for("some-reservation-id");
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        assert!(name.len() <= 63);
    }
}
