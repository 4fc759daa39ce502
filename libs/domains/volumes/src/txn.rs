//! Transaction-scoped bind helper.
//!
//! Binding a volume to a reservation needs to lock the `volumes` row and
//! flip `in_use`/`reservation_id` in the *same* transaction the caller uses
//! to move the reservation forward — see the nested-scope trap in
//! `database::postgres::scope`. Unlike the GPU-type admission lock, this
//! acquisition is fail-fast rather than bounded-wait: a volume already
//! locked by a concurrent operation should immediately surface as "in use",
//! not queue behind it.

use sea_orm::{ConnectionTrait, DatabaseTransaction, Statement};
use uuid::Uuid;

use crate::error::{VolumeError, VolumeResult};
use crate::models::BindOutcome;

struct LockedRow {
    in_use: bool,
    is_deleted: bool,
}

/// Lock `volumes.id = id` with `FOR UPDATE NOWAIT` and, if free and not
/// deleted, bind it to `reservation_id` within `txn`.
pub async fn bind_volume(
    txn: &DatabaseTransaction,
    id: Uuid,
    reservation_id: Uuid,
) -> VolumeResult<BindOutcome> {
    let row = match txn
        .query_one(Statement::from_sql_and_values(
            txn.get_database_backend(),
            "SELECT in_use, is_deleted FROM volumes WHERE id = $1 FOR UPDATE NOWAIT",
            [id.into()],
        ))
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => return Ok(BindOutcome::NotFound),
        Err(e) if e.to_string().to_lowercase().contains("lock") => {
            return Ok(BindOutcome::LockUnavailable);
        }
        Err(e) => return Err(VolumeError::Database(e.to_string())),
    };

    let locked = LockedRow {
        in_use: row.try_get("", "in_use")?,
        is_deleted: row.try_get("", "is_deleted")?,
    };

    if locked.is_deleted {
        return Ok(BindOutcome::Deleted);
    }
    if locked.in_use {
        return Ok(BindOutcome::AlreadyInUse);
    }

    txn.execute(Statement::from_sql_and_values(
        txn.get_database_backend(),
        "UPDATE volumes SET in_use = true, reservation_id = $1, last_used = now() WHERE id = $2",
        [reservation_id.into(), id.into()],
    ))
    .await?;

    Ok(BindOutcome::Bound)
}

/// Detach a volume from its reservation within `txn`, used on cancel/expiry.
pub async fn unbind_volume(txn: &DatabaseTransaction, id: Uuid) -> VolumeResult<()> {
    txn.execute(Statement::from_sql_and_values(
        txn.get_database_backend(),
        "UPDATE volumes SET in_use = false, reservation_id = NULL, last_used = now() WHERE id = $1",
        [id.into()],
    ))
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_row_reports_deleted_before_in_use() {
        let deleted_and_in_use = LockedRow {
            in_use: true,
            is_deleted: true,
        };
        assert!(deleted_and_in_use.is_deleted);
    }
}
