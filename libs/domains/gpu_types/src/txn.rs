//! Transaction-scoped admission helper.
//!
//! The admission algorithm needs to lock a `gpu_types` row, read it, and
//! (if capacity allows) decrement `available_gpus` in the *same* transaction
//! that moves the reservation to `pending` — see the nested-scope trap in
//! `database::postgres::scope`. This module therefore operates on a borrowed
//! `&DatabaseTransaction` handed down by the caller's `transaction_scope`,
//! never on a pooled connection of its own.

use sea_orm::{ConnectionTrait, DatabaseTransaction, Statement, TransactionTrait};

use crate::error::{GpuTypeError, GpuTypeResult};
use crate::models::{AdmissionDecision, GpuType};

/// Row shape returned by the locked read, kept separate from `entity::Model`
/// since this is a raw statement, not a SeaORM entity query (we need
/// `FOR UPDATE` plus a statement-level lock timeout that the entity API
/// doesn't expose).
struct LockedRow {
    max_gpus_per_node: i32,
    max_multinode_nodes: i32,
    available_gpus: i32,
    full_nodes_available: i32,
}

/// Lock the GPU-type row and, if the requested capacity is available,
/// decrement `available_gpus` within `txn`. Aborts (returns
/// `InsufficientCapacity`) rather than blocking past `lock_timeout_ms` --
/// matching "if the transaction would block for more than T_lock, abort".
pub async fn lock_and_decrement(
    txn: &DatabaseTransaction,
    tag: &str,
    gpu_count: i32,
    is_multinode: bool,
    lock_timeout_ms: u64,
) -> GpuTypeResult<AdmissionDecision> {
    txn.execute(Statement::from_string(
        txn.get_database_backend(),
        format!("SET LOCAL lock_timeout = '{lock_timeout_ms}ms'"),
    ))
    .await?;

    let row = txn
        .query_one(Statement::from_sql_and_values(
            txn.get_database_backend(),
            r#"SELECT max_gpus_per_node, max_multinode_nodes, available_gpus, full_nodes_available
               FROM gpu_types WHERE tag = $1 FOR UPDATE"#,
            [tag.into()],
        ))
        .await
        .map_err(|e| {
            if e.to_string().to_lowercase().contains("lock") {
                GpuTypeError::Validation(format!("admission lock timeout on {tag}"))
            } else {
                GpuTypeError::Database(e.to_string())
            }
        })?
        .ok_or_else(|| GpuTypeError::NotFound(tag.to_string()))?;

    let locked = LockedRow {
        max_gpus_per_node: row.try_get("", "max_gpus_per_node")?,
        max_multinode_nodes: row.try_get("", "max_multinode_nodes")?,
        available_gpus: row.try_get("", "available_gpus")?,
        full_nodes_available: row.try_get("", "full_nodes_available")?,
    };

    if !decide_admission(&locked, gpu_count, is_multinode) {
        return Ok(AdmissionDecision::InsufficientCapacity);
    }

    txn.execute(Statement::from_sql_and_values(
        txn.get_database_backend(),
        "UPDATE gpu_types SET available_gpus = available_gpus - $1 WHERE tag = $2",
        [gpu_count.into(), tag.into()],
    ))
    .await?;

    Ok(AdmissionDecision::Admitted)
}

/// Pure admission arithmetic, split out from `lock_and_decrement` so it can
/// be unit tested without a database.
fn decide_admission(locked: &LockedRow, gpu_count: i32, is_multinode: bool) -> bool {
    if is_multinode {
        locked.max_gpus_per_node > 0
            && gpu_count % locked.max_gpus_per_node == 0
            && gpu_count / locked.max_gpus_per_node <= locked.max_multinode_nodes
            && gpu_count / locked.max_gpus_per_node <= locked.full_nodes_available
    } else {
        gpu_count <= locked.available_gpus && gpu_count <= locked.max_gpus_per_node
    }
}

/// Read the GPU-type row inside an already-open transaction (no additional
/// lock), used by handlers that need the row but aren't doing admission.
pub async fn get_for_update_free(txn: &DatabaseTransaction, tag: &str) -> GpuTypeResult<Option<GpuType>> {
    use crate::entity;
    use sea_orm::EntityTrait;

    let model = entity::Entity::find_by_id(tag.to_string())
        .one(txn)
        .await?;
    Ok(model.map(Into::into))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(max_gpus_per_node: i32, max_multinode_nodes: i32, available: i32, full_nodes: i32) -> LockedRow {
        LockedRow {
            max_gpus_per_node,
            max_multinode_nodes,
            available_gpus: available,
            full_nodes_available: full_nodes,
        }
    }

    #[test]
    fn single_node_admits_at_exact_availability() {
        let r = row(8, 4, 4, 1);
        assert!(decide_admission(&r, 4, false));
    }

    #[test]
    fn single_node_rejects_one_over_availability() {
        let r = row(8, 4, 4, 1);
        assert!(!decide_admission(&r, 5, false));
    }

    #[test]
    fn single_node_rejects_exceeding_per_node_cap_even_with_availability() {
        let r = row(8, 4, 16, 2);
        assert!(!decide_admission(&r, 9, false));
    }

    #[test]
    fn multinode_requires_exact_multiple_of_per_node_cap() {
        let r = row(8, 4, 32, 4);
        assert!(!decide_admission(&r, 12, true));
        assert!(decide_admission(&r, 16, true));
    }

    #[test]
    fn multinode_caps_at_four_full_nodes() {
        let r = row(8, 4, 64, 8);
        assert!(!decide_admission(&r, 40, true)); // 5 nodes > max_multinode_nodes=4
        assert!(decide_admission(&r, 32, true)); // 4 nodes, within cap
    }

    #[test]
    fn multinode_limited_by_full_nodes_available() {
        let r = row(8, 4, 64, 2);
        assert!(!decide_admission(&r, 32, true)); // needs 4 full nodes, only 2 free
        assert!(decide_admission(&r, 16, true));
    }

    #[test]
    fn cpu_only_tag_never_admits_multinode() {
        let r = row(0, 1, 3, 1);
        assert!(!decide_admission(&r, 0, true));
    }
}
