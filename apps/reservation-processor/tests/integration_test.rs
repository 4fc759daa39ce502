//! Integration tests for the mutate handlers' database-only paths against
//! real PostgreSQL via testcontainers.
//!
//! `AppState` also carries a cluster gateway and a cloud adapter, but
//! `mockall::automock` for those traits is only generated for the defining
//! crate's own unit tests, not for downstream integration tests. The paths
//! exercised here (`handle_extend`, and `handle_cancel` on a reservation
//! with no pod or volume yet) never call either collaborator, so the stubs
//! below only need to exist to satisfy `AppState`'s fields.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use cloud_adapter::{
    AutoScalingGroupCount, CloudAdapter, CloudAdapterResult, CloudSnapshot, CloudVolume,
};
use cluster_gateway::{
    ClusterGateway, GatewayResult, JupyterSidecarRequest, JupyterSidecarState, NodeEvent, NodeInfo,
    PodSpecRequest, PodStatusSnapshot,
};
use database::postgres::PostgresConfig;
use database::redis::RedisConfig;
use domain_audit::PgAuditRepository;
use domain_gpu_types::PgGpuTypeRepository;
use domain_reservations::state_machine::can_extend;
use domain_reservations::{
    CreateReservation, PgReservationRepository, ReservationError, ReservationPatch,
    ReservationRepository, ReservationStatus, StatusHistoryEntry,
};
use domain_volumes::PgVolumeRepository;
use reservation_processor::config::Config;
use reservation_processor::handlers::mutate::{handle_cancel, handle_extend};
use reservation_processor::handlers::AppState;
use sea_orm::EntityTrait;
use test_utils::{TestDataBuilder, TestDatabase};

struct UnusedClusterGateway;

#[async_trait]
impl ClusterGateway for UnusedClusterGateway {
    async fn create_pod(&self, _request: PodSpecRequest) -> GatewayResult<()> {
        unreachable!("this test path never schedules a pod")
    }
    async fn delete_pod(&self, _namespace: &str, _pod_name: &str) -> GatewayResult<()> {
        unreachable!("this test path never deletes a pod")
    }
    async fn get_pod_status(&self, _namespace: &str, _pod_name: &str) -> GatewayResult<Option<PodStatusSnapshot>> {
        unreachable!()
    }
    async fn list_nodes_for_tag(&self, _tag_label: &str) -> GatewayResult<Vec<NodeInfo>> {
        unreachable!()
    }
    async fn pod_events(&self, _namespace: &str, _pod_name: &str) -> GatewayResult<Vec<NodeEvent>> {
        unreachable!()
    }
    async fn pod_logs(&self, _namespace: &str, _pod_name: &str, _tail_lines: i64) -> GatewayResult<String> {
        unreachable!()
    }
    async fn configure_jupyter_sidecar(
        &self,
        _request: JupyterSidecarRequest,
    ) -> GatewayResult<JupyterSidecarState> {
        unreachable!()
    }
    async fn create_persistent_volume(&self, _name: &str, _size_gib: i32) -> GatewayResult<String> {
        unreachable!()
    }
    async fn delete_persistent_volume(&self, _cloud_volume_id: &str) -> GatewayResult<()> {
        unreachable!()
    }
    async fn write_file(&self, _namespace: &str, _pod_name: &str, _path: &str, _contents: &str) -> GatewayResult<()> {
        unreachable!()
    }
    async fn broadcast_message(&self, _namespace: &str, _pod_name: &str, _message: &str) -> GatewayResult<()> {
        unreachable!()
    }
    async fn write_ssh_key(&self, _namespace: &str, _pod_name: &str, _public_key: &str) -> GatewayResult<()> {
        unreachable!()
    }
}

struct UnusedCloudAdapter;

#[async_trait]
impl CloudAdapter for UnusedCloudAdapter {
    async fn list_tagged_volumes(&self, _tag_key: &str, _tag_value: &str) -> CloudAdapterResult<Vec<CloudVolume>> {
        unreachable!()
    }
    async fn describe_snapshots(&self, _volume_id: &str) -> CloudAdapterResult<Vec<CloudSnapshot>> {
        unreachable!()
    }
    async fn create_snapshot(&self, _volume_id: &str) -> CloudAdapterResult<CloudSnapshot> {
        unreachable!()
    }
    async fn delete_snapshot(&self, _snapshot_id: &str) -> CloudAdapterResult<()> {
        unreachable!()
    }
    async fn delete_volume(&self, _volume_id: &str) -> CloudAdapterResult<()> {
        unreachable!()
    }
    async fn describe_asg_instance_counts(&self, _name_pattern: &str) -> CloudAdapterResult<Vec<AutoScalingGroupCount>> {
        unreachable!()
    }
}

fn test_config(total_max_hours: f64) -> Config {
    Config {
        database: PostgresConfig::new("postgres://unused/unused"),
        redis: RedisConfig::new("redis://unused"),
        queue_name_reservations: "gpu_reservations".to_string(),
        queue_name_disk_ops: "disk_operations".to_string(),
        poll_interval_seconds: 5,
        visibility_timeout_seconds: 300,
        batch_size: 1,
        max_deliveries: 3,
        prepare_timeout_seconds: 900,
        reservation_max_hours: 24.0,
        extension_max_hours: 24.0,
        total_max_hours,
        high_end_gpu_tags: HashSet::new(),
        max_multinode_nodes: 4,
        cpu_users_per_node: 3,
        volume_soft_delete_retention_days: 30,
        worker_concurrency: 4,
        retry_base_delay_ms: 200,
        retry_max_delay_ms: 30_000,
        retry_max_attempts: 5,
        admin_health_port: 8090,
    }
}

async fn app_state(db: &TestDatabase, total_max_hours: f64) -> AppState {
    AppState {
        db: db.connection(),
        reservations: Arc::new(PgReservationRepository::new(db.connection())),
        volumes: Arc::new(PgVolumeRepository::new(db.connection())),
        gpu_types: Arc::new(PgGpuTypeRepository::new(db.connection())),
        cluster: Arc::new(UnusedClusterGateway),
        cloud: Arc::new(UnusedCloudAdapter),
        audit: Arc::new(PgAuditRepository::new(db.connection())),
        config: Arc::new(test_config(total_max_hours)),
    }
}

fn reservation_input(builder: &TestDataBuilder, suffix: &str) -> CreateReservation {
    CreateReservation {
        id: builder.name("res", suffix),
        user_id: builder.user_id().to_string(),
        gpu_type: "h100".to_string(),
        gpu_count: 8,
        instance_type: "p5.48xlarge".to_string(),
        duration_hours: 4.0,
        image: "nvcr.io/nvidia/pytorch:24.01".to_string(),
        disk_name: None,
        env_vars: std::collections::HashMap::new(),
        jupyter_enabled: false,
        preserve_entrypoint: false,
        github_user: None,
        is_multinode: false,
        total_nodes: None,
        node_index: None,
        master_reservation_id: None,
    }
}

#[tokio::test]
async fn handle_extend_pushes_out_expiry_time_within_budget() {
    let db = TestDatabase::new().await;
    let state = app_state(&db, 48.0).await;
    let builder = TestDataBuilder::from_test_name("rp_extend_ok");

    let created = state.reservations.create(reservation_input(&builder, "extend")).await.unwrap();
    let now = Utc::now();
    let launch_time = now - Duration::hours(1);
    let expiry_time = now + Duration::hours(3);
    state
        .reservations
        .apply_patch(
            &created.id,
            ReservationPatch {
                status: Some(ReservationStatus::Active),
                append_history: Some(StatusHistoryEntry {
                    status: ReservationStatus::Active,
                    timestamp: launch_time,
                    detail: None,
                }),
                launch_time: Some(launch_time),
                expiry_time: Some(expiry_time),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(can_extend(ReservationStatus::Active));

    handle_extend(&state, &created.id, &created.user_id, 2.0).await.unwrap();

    let after = state.reservations.get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(after.expiry_time.unwrap(), expiry_time + Duration::hours(2));
}

#[tokio::test]
async fn handle_extend_refuses_once_the_total_time_budget_is_exceeded() {
    let db = TestDatabase::new().await;
    let state = app_state(&db, 6.0).await;
    let builder = TestDataBuilder::from_test_name("rp_extend_over_budget");

    let created = state.reservations.create(reservation_input(&builder, "extend-over")).await.unwrap();
    let now = Utc::now();
    let launch_time = now - Duration::hours(1);
    let expiry_time = now + Duration::hours(3);
    state
        .reservations
        .apply_patch(
            &created.id,
            ReservationPatch {
                status: Some(ReservationStatus::Active),
                launch_time: Some(launch_time),
                expiry_time: Some(expiry_time),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = handle_extend(&state, &created.id, &created.user_id, 10.0).await.unwrap_err();
    assert!(matches!(err, ReservationError::UserFatal(_)));

    let after = state.reservations.get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(after.expiry_time.unwrap(), expiry_time, "a rejected extension must not touch expiry_time");
}

#[tokio::test]
async fn handle_cancel_marks_a_podless_reservation_cancelled_and_records_an_audit_entry() {
    let db = TestDatabase::new().await;
    let state = app_state(&db, 48.0).await;
    let builder = TestDataBuilder::from_test_name("rp_cancel");

    let created = state.reservations.create(reservation_input(&builder, "cancel")).await.unwrap();

    handle_cancel(&state, &created.id, &created.user_id).await.unwrap();

    let after = state.reservations.get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(after.status, ReservationStatus::Cancelled);
    assert!(after.reservation_ended.is_some());

    let entries = domain_audit::entity::Entity::find().all(db.connection()).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "cancel");
}
