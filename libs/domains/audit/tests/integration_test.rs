//! Integration tests for the append-only audit trail
//!
//! These run against real PostgreSQL via testcontainers to ensure:
//! - `record` persists every field, including JSON `details` and a v7 id.
//! - The trail is genuinely append-only: nothing in this crate's public
//!   surface can update or delete a row once written.

use domain_audit::entity;
use domain_audit::{AuditRepository, NewAuditEntry, PgAuditRepository};
use sea_orm::EntityTrait;
use test_utils::{TestDataBuilder, TestDatabase};

#[tokio::test]
async fn record_persists_every_field() {
    let db = TestDatabase::new().await;
    let repo = PgAuditRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("audit_record");

    let user_id = builder.user_id().to_string();
    repo.record(NewAuditEntry {
        user_id: user_id.clone(),
        event_type: "reservation".to_string(),
        action: "admit".to_string(),
        resource_type: "reservation".to_string(),
        resource_id: "res-1".to_string(),
        details: serde_json::json!({"gpu_type": "h100", "gpu_count": 8}),
        actor_ip: Some("10.0.0.1".to_string()),
    })
    .await
    .unwrap();

    let rows = entity::Entity::find().all(db.connection()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.user_id, user_id);
    assert_eq!(row.action, "admit");
    assert_eq!(row.details["gpu_type"], "h100");
    assert_eq!(row.actor_ip.as_deref(), Some("10.0.0.1"));
    assert_eq!(row.id.get_version_num(), 7);
}

#[tokio::test]
async fn record_appends_rather_than_overwrites_prior_entries() {
    let db = TestDatabase::new().await;
    let repo = PgAuditRepository::new(db.connection());
    let builder = TestDataBuilder::from_test_name("audit_append_only");

    let user_id = builder.user_id().to_string();

    for action in ["create", "extend", "cancel"] {
        repo.record(NewAuditEntry {
            user_id: user_id.clone(),
            event_type: "reservation".to_string(),
            action: action.to_string(),
            resource_type: "reservation".to_string(),
            resource_id: "res-1".to_string(),
            details: serde_json::Value::Null,
            actor_ip: None,
        })
        .await
        .unwrap();
    }

    let rows = entity::Entity::find().all(db.connection()).await.unwrap();
    assert_eq!(rows.len(), 3, "every record call must add a row, never overwrite one");

    let mut actions: Vec<&str> = rows.iter().map(|r| r.action.as_str()).collect();
    actions.sort_unstable();
    assert_eq!(actions, vec!["cancel", "create", "extend"]);
}
