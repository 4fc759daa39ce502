//! Integration tests for the GPU-type catalog domain
//!
//! These run against real PostgreSQL via testcontainers to ensure:
//! - The admission arithmetic (`txn::lock_and_decrement`) holds under a
//!   real row lock, not just against the in-memory `LockedRow` fixtures in
//!   `txn.rs`'s own unit tests.
//! - `apply_availability_update` overwrites exactly the columns it owns.
//! - Concurrent admissions against the same row serialize instead of both
//!   succeeding over capacity.

use domain_gpu_types::models::AdmissionDecision;
use domain_gpu_types::{AvailabilityUpdate, GpuTypeRepository, PgGpuTypeRepository};
use test_utils::TestDatabase;

#[tokio::test]
async fn migrations_seed_the_documented_gpu_types() {
    let db = TestDatabase::new().await;
    let repo = PgGpuTypeRepository::new(db.connection());

    let types = repo.list().await.unwrap();
    let tags: Vec<&str> = types.iter().map(|t| t.tag.as_str()).collect();

    for expected in ["h100", "a100", "t4", "cpu-x86", "cpu-arm"] {
        assert!(tags.contains(&expected), "expected seeded tag {expected}");
    }

    let cpu_x86 = types.iter().find(|t| t.tag == "cpu-x86").unwrap();
    assert!(cpu_x86.is_cpu_only());
}

#[tokio::test]
async fn apply_availability_update_overwrites_only_its_own_columns() {
    let db = TestDatabase::new().await;
    let repo = PgGpuTypeRepository::new(db.connection());

    repo.apply_availability_update(AvailabilityUpdate {
        tag: "h100".to_string(),
        total_cluster_gpus: 64,
        available_gpus: 40,
        max_reservable: 8,
        full_nodes_available: 5,
        running_instances: 3,
        updated_by: "availability-reconciler".to_string(),
    })
    .await
    .unwrap();

    let updated = repo.get_by_tag("h100").await.unwrap().unwrap();
    assert_eq!(updated.total_cluster_gpus, 64);
    assert_eq!(updated.available_gpus, 40);
    assert_eq!(updated.max_reservable, 8);
    assert_eq!(updated.full_nodes_available, 5);
    assert_eq!(updated.running_instances, 3);
    assert_eq!(updated.last_availability_updated_by.as_deref(), Some("availability-reconciler"));
    // Static columns from the seed migration are untouched.
    assert_eq!(updated.max_gpus_per_node, 8);
    assert_eq!(updated.instance_family, "p5");
}

#[tokio::test]
async fn lock_and_decrement_admits_and_decrements_available_gpus() {
    let db = TestDatabase::new().await;
    let repo = PgGpuTypeRepository::new(db.connection());

    repo.apply_availability_update(AvailabilityUpdate {
        tag: "t4".to_string(),
        total_cluster_gpus: 10,
        available_gpus: 4,
        max_reservable: 1,
        full_nodes_available: 4,
        running_instances: 6,
        updated_by: "test".to_string(),
    })
    .await
    .unwrap();

    let txn = database::postgres::transaction_scope(db.connection()).await.unwrap();
    let decision = domain_gpu_types::txn::lock_and_decrement(&txn, "t4", 3, false, 2_000)
        .await
        .unwrap();
    assert_eq!(decision, AdmissionDecision::Admitted);
    txn.commit().await.unwrap();

    let after = repo.get_by_tag("t4").await.unwrap().unwrap();
    assert_eq!(after.available_gpus, 1);
}

#[tokio::test]
async fn lock_and_decrement_refuses_over_capacity_and_leaves_the_row_untouched() {
    let db = TestDatabase::new().await;
    let repo = PgGpuTypeRepository::new(db.connection());

    repo.apply_availability_update(AvailabilityUpdate {
        tag: "t4".to_string(),
        total_cluster_gpus: 10,
        available_gpus: 2,
        max_reservable: 1,
        full_nodes_available: 2,
        running_instances: 8,
        updated_by: "test".to_string(),
    })
    .await
    .unwrap();

    let txn = database::postgres::transaction_scope(db.connection()).await.unwrap();
    let decision = domain_gpu_types::txn::lock_and_decrement(&txn, "t4", 3, false, 2_000)
        .await
        .unwrap();
    assert_eq!(decision, AdmissionDecision::InsufficientCapacity);
    txn.commit().await.unwrap();

    let after = repo.get_by_tag("t4").await.unwrap().unwrap();
    assert_eq!(after.available_gpus, 2, "a refused admission must not touch available_gpus");
}

#[tokio::test]
async fn concurrent_admissions_never_oversubscribe_a_single_row() {
    let db = TestDatabase::new().await;
    let repo = PgGpuTypeRepository::new(db.connection());

    repo.apply_availability_update(AvailabilityUpdate {
        tag: "a100".to_string(),
        total_cluster_gpus: 8,
        available_gpus: 8,
        max_reservable: 1,
        full_nodes_available: 1,
        running_instances: 0,
        updated_by: "test".to_string(),
    })
    .await
    .unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let conn = db.connection();
        handles.push(tokio::spawn(async move {
            let txn = database::postgres::transaction_scope(&conn).await.unwrap();
            let decision = domain_gpu_types::txn::lock_and_decrement(&txn, "a100", 4, false, 5_000)
                .await
                .unwrap();
            txn.commit().await.unwrap();
            decision
        }));
    }

    let decisions: Vec<AdmissionDecision> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let admitted = decisions.iter().filter(|d| **d == AdmissionDecision::Admitted).count();
    assert_eq!(admitted, 2, "only two 4-GPU admissions fit in 8 available");

    let after = repo.get_by_tag("a100").await.unwrap().unwrap();
    assert_eq!(after.available_gpus, 0);
}
