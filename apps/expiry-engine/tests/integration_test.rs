//! Integration tests for the expiry/warning logic against real PostgreSQL
//!
//! `Engine::run_tick` itself needs a live cluster and cloud adapter, so
//! these exercise the same pure ladder/expiry functions `run_tick` calls
//! against reservation rows written and read through a real database
//! instance via testcontainers, rather than in-memory fixtures.

use chrono::{Duration, Utc};
use domain_reservations::state_machine::is_expired;
use domain_reservations::{CreateReservation, PgReservationRepository, ReservationPatch, ReservationRepository, StatusHistoryEntry, ReservationStatus};
use expiry_engine::engine::pending_warnings;
use test_utils::{TestDataBuilder, TestDatabase};

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
async fn active_reservation_near_expiry_owes_the_elapsed_warning_rungs() {
    let db = TestDatabase::new().await;
    let repo = PgReservationRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("ee_warning_ladder");

    let created = repo.create(reservation_input(&builder, "warn")).await.unwrap();

    let now = Utc::now();
    let expiry_time = now + Duration::minutes(10);
    repo.apply_patch(
        &created.id,
        ReservationPatch {
            status: Some(ReservationStatus::Active),
            append_history: Some(StatusHistoryEntry {
                status: ReservationStatus::Active,
                timestamp: now - Duration::hours(1),
                detail: None,
            }),
            launch_time: Some(now - Duration::hours(1)),
            expiry_time: Some(expiry_time),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let active = repo.list_active().await.unwrap();
    assert_eq!(active.len(), 1);
    let reservation = &active[0];

    let actions = pending_warnings(
        reservation.expiry_time.unwrap(),
        now,
        &reservation.warnings_sent,
        &[30, 15, 5],
    );

    assert_eq!(actions.len(), 2, "10 minutes left owes both the 30 and 15 minute rungs");
    assert_eq!(actions[0].threshold_minutes, 15);
    assert_eq!(actions[1].threshold_minutes, 30);
}

#[tokio::test]
async fn list_active_only_returns_rows_already_moved_to_active() {
    let db = TestDatabase::new().await;
    let repo = PgReservationRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("ee_list_active");

    let active = repo.create(reservation_input(&builder, "active")).await.unwrap();
    let _queued = repo.create(reservation_input(&builder, "queued")).await.unwrap();

    repo.apply_patch(
        &active.id,
        ReservationPatch {
            status: Some(ReservationStatus::Active),
            expiry_time: Some(Utc::now() + Duration::hours(2)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let rows = repo.list_active().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, active.id);
}

#[tokio::test]
async fn is_expired_matches_a_reservation_whose_expiry_time_has_passed() {
    let db = TestDatabase::new().await;
    let repo = PgReservationRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("ee_is_expired");

    let reservation = repo.create(reservation_input(&builder, "expired")).await.unwrap();

    let now = Utc::now();
    repo.apply_patch(
        &reservation.id,
        ReservationPatch {
            status: Some(ReservationStatus::Active),
            expiry_time: Some(now - Duration::minutes(1)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let fetched = repo.get_by_id(&reservation.id).await.unwrap().unwrap();
    assert!(is_expired(now, fetched.expiry_time.unwrap()));
}
