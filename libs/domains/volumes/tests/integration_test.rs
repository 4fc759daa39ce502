//! Integration tests for the volume catalog domain
//!
//! These run against real PostgreSQL via testcontainers to ensure:
//! - Repository CRUD and the soft-delete/hard-delete lifecycle behave as
//!   the Expiry Engine's retention sweep depends on.
//! - `txn::bind_volume`/`unbind_volume` enforce fail-fast locking (`FOR
//!   UPDATE NOWAIT`) rather than queuing behind a concurrent bind.

use chrono::{Duration, Utc};
use domain_volumes::{CreateVolume, PgVolumeRepository, VolumeRepository};
use test_utils::{assertions::*, TestDataBuilder, TestDatabase};
use uuid::Uuid;

#[tokio::test]
async fn create_and_get_round_trip() {
    let db = TestDatabase::new().await;
    let repo = PgVolumeRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("volume_create_get");

    let user_id = builder.user_id().to_string();
    let created = repo
        .create(CreateVolume {
            user_id: user_id.clone(),
            name: builder.name("volume", "main"),
            size_gib: 500,
            operation_id: "op-1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(created.size_gib, 500);
    assert!(!created.in_use);
    assert!(!created.is_deleted);

    let fetched = repo.get_by_id(created.id).await.unwrap();
    let fetched = assert_some(fetched, "volume should exist");
    assert_uuid_eq(fetched.id, created.id, "volume id");

    let by_name = repo.get_by_user_and_name(&user_id, &created.name).await.unwrap();
    assert_some(by_name, "volume should be findable by user and name");
}

#[tokio::test]
async fn list_for_user_excludes_other_users_and_deleted_rows() {
    let db = TestDatabase::new().await;
    let repo = PgVolumeRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("volume_list_for_user");

    let user_id = builder.user_id().to_string();
    let other_user = Uuid::new_v4().to_string();

    let mine = repo
        .create(CreateVolume {
            user_id: user_id.clone(),
            name: builder.name("volume", "mine"),
            size_gib: 100,
            operation_id: "op-1".to_string(),
        })
        .await
        .unwrap();

    let deleted = repo
        .create(CreateVolume {
            user_id: user_id.clone(),
            name: builder.name("volume", "mine-deleted"),
            size_gib: 100,
            operation_id: "op-2".to_string(),
        })
        .await
        .unwrap();

    repo.create(CreateVolume {
        user_id: other_user,
        name: builder.name("volume", "not-mine"),
        size_gib: 100,
        operation_id: "op-3".to_string(),
    })
    .await
    .unwrap();

    repo.mark_deleted(deleted.id, Utc::now() + Duration::days(30)).await.unwrap();

    let mine_list = repo.list_for_user(&user_id).await.unwrap();
    assert_eq!(mine_list.len(), 1);
    assert_uuid_eq(mine_list[0].id, mine.id, "only the non-deleted own volume");
}

#[tokio::test]
async fn hard_deletion_sweep_only_returns_rows_past_their_retention_window() {
    let db = TestDatabase::new().await;
    let repo = PgVolumeRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("volume_hard_delete_sweep");

    let user_id = builder.user_id().to_string();

    let expired = repo
        .create(CreateVolume {
            user_id: user_id.clone(),
            name: builder.name("volume", "expired"),
            size_gib: 100,
            operation_id: "op-1".to_string(),
        })
        .await
        .unwrap();

    let not_yet = repo
        .create(CreateVolume {
            user_id: user_id.clone(),
            name: builder.name("volume", "not-yet"),
            size_gib: 100,
            operation_id: "op-2".to_string(),
        })
        .await
        .unwrap();

    let now = Utc::now();
    repo.mark_deleted(expired.id, now - Duration::days(1)).await.unwrap();
    repo.mark_deleted(not_yet.id, now + Duration::days(29)).await.unwrap();

    let due = repo.list_for_hard_deletion(now).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_uuid_eq(due[0].id, expired.id, "only the row past its retention window");

    repo.purge(expired.id).await.unwrap();
    assert!(repo.get_by_id(expired.id).await.unwrap().is_none());
}

#[tokio::test]
async fn bind_volume_binds_a_free_row_and_reports_already_in_use_on_reuse() {
    let db = TestDatabase::new().await;
    let repo = PgVolumeRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("volume_bind");

    let volume = repo
        .create(CreateVolume {
            user_id: builder.user_id().to_string(),
            name: builder.name("volume", "bindable"),
            size_gib: 200,
            operation_id: "op-1".to_string(),
        })
        .await
        .unwrap();

    let reservation_id = Uuid::new_v4();

    let txn = database::postgres::transaction_scope(db.connection()).await.unwrap();
    let outcome = domain_volumes::txn::bind_volume(&txn, volume.id, reservation_id).await.unwrap();
    txn.commit().await.unwrap();
    assert_eq!(outcome, domain_volumes::BindOutcome::Bound);

    let bound = repo.get_by_id(volume.id).await.unwrap().unwrap();
    assert!(bound.in_use);
    assert_eq!(bound.reservation_id, Some(reservation_id));

    let txn = database::postgres::transaction_scope(db.connection()).await.unwrap();
    let second = domain_volumes::txn::bind_volume(&txn, volume.id, Uuid::new_v4()).await.unwrap();
    txn.commit().await.unwrap();
    assert_eq!(second, domain_volumes::BindOutcome::AlreadyInUse);
}

#[tokio::test]
async fn release_clears_in_use_and_reservation_id() {
    let db = TestDatabase::new().await;
    let repo = PgVolumeRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("volume_release");

    let volume = repo
        .create(CreateVolume {
            user_id: builder.user_id().to_string(),
            name: builder.name("volume", "release-me"),
            size_gib: 200,
            operation_id: "op-1".to_string(),
        })
        .await
        .unwrap();

    let reservation_id = Uuid::new_v4();
    let txn = database::postgres::transaction_scope(db.connection()).await.unwrap();
    domain_volumes::txn::bind_volume(&txn, volume.id, reservation_id).await.unwrap();
    txn.commit().await.unwrap();

    repo.release(volume.id).await.unwrap();

    let released = repo.get_by_id(volume.id).await.unwrap().unwrap();
    assert!(!released.in_use);
    assert_eq!(released.reservation_id, None);
}
