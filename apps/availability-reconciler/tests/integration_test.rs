//! Integration tests for the counters `status()` reports, against real
//! PostgreSQL via testcontainers.
//!
//! `status()` itself loads its database handle from `Config::from_env()`,
//! which would mean mutating process-global environment variables from a
//! test binary that also runs other tests concurrently — instead these
//! exercise the same repository calls and arithmetic `status()` performs,
//! against a container-backed database built the same way its own
//! handlers are tested.

use domain_gpu_types::{AvailabilityUpdate, GpuTypeRepository, PgGpuTypeRepository};
use domain_volumes::{CreateVolume, PgVolumeRepository, VolumeRepository};
use test_utils::{TestDataBuilder, TestDatabase};

#[tokio::test]
async fn counters_reflect_seeded_gpu_types_and_availability_updates() {
    let db = TestDatabase::new().await;
    let gpu_types = PgGpuTypeRepository::new(db.connection());

    gpu_types
        .apply_availability_update(AvailabilityUpdate {
            tag: "h100".to_string(),
            total_cluster_gpus: 32,
            available_gpus: 20,
            max_reservable: 8,
            full_nodes_available: 2,
            running_instances: 1,
            updated_by: "test".to_string(),
        })
        .await
        .unwrap();

    let types = gpu_types.list().await.unwrap();
    assert_eq!(types.len(), 5, "the seed migration's five gpu types");

    let total_cluster_gpus: i32 = types.iter().map(|t| t.total_cluster_gpus).sum();
    let available_gpus: i32 = types.iter().map(|t| t.available_gpus).sum();
    assert_eq!(total_cluster_gpus, 32, "only h100 has been given a nonzero total");
    assert_eq!(available_gpus, 20);
}

#[tokio::test]
async fn active_volume_count_excludes_soft_deleted_rows() {
    let db = TestDatabase::new().await;
    let volumes = PgVolumeRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("ar_status_volumes");

    let user_id = builder.user_id().to_string();

    for i in 0..2 {
        volumes
            .create(CreateVolume {
                user_id: user_id.clone(),
                name: builder.name("volume", &format!("active-{i}")),
                size_gib: 100,
                operation_id: format!("op-{i}"),
            })
            .await
            .unwrap();
    }

    let deleted = volumes
        .create(CreateVolume {
            user_id,
            name: builder.name("volume", "deleted"),
            size_gib: 100,
            operation_id: "op-deleted".to_string(),
        })
        .await
        .unwrap();
    volumes.mark_deleted(deleted.id, chrono::Utc::now()).await.unwrap();

    let active = volumes.list_active().await.unwrap();
    assert_eq!(active.len(), 2, "status()'s active_volume_count must not count soft-deleted rows");
}
