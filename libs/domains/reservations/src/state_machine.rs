//! Pure reservation state-machine guards, split out from the handlers that
//! perform the actual DB/CG/CA side effects so the transition table itself
//! can be unit tested without any of them.

use chrono::{DateTime, Utc};

use crate::models::ReservationStatus;

/// `queued -> pending`: gated on capacity, decided by the GPU-type admission
/// lock elsewhere; this only encodes that the source state is legal.
pub fn can_admit(status: ReservationStatus) -> bool {
    status == ReservationStatus::Queued
}

pub fn can_cancel(status: ReservationStatus) -> bool {
    !status.is_terminal()
}

pub fn can_extend(status: ReservationStatus) -> bool {
    status == ReservationStatus::Active
}

/// `pending -> preparing`, on pod scheduled with a node assignment.
pub fn can_prepare(status: ReservationStatus) -> bool {
    status == ReservationStatus::Pending
}

/// `preparing -> active`, on readiness probe success.
pub fn can_activate(status: ReservationStatus) -> bool {
    status == ReservationStatus::Preparing
}

/// Admission timeout: `pending` held longer than `admit_timeout`.
pub fn admission_timed_out(entered_pending_at: DateTime<Utc>, now: DateTime<Utc>, admit_timeout_secs: i64) -> bool {
    (now - entered_pending_at).num_seconds() > admit_timeout_secs
}

/// Prepare timeout: `preparing` held longer than `prepare_timeout`.
pub fn prepare_timed_out(entered_preparing_at: DateTime<Utc>, now: DateTime<Utc>, prepare_timeout_secs: i64) -> bool {
    (now - entered_preparing_at).num_seconds() > prepare_timeout_secs
}

/// Extension clamp: `new_expiry <= launch_time + TOTAL_MAX_HOURS`.
pub fn extension_allowed(
    launch_time: DateTime<Utc>,
    new_expiry: DateTime<Utc>,
    total_max_hours: f64,
) -> bool {
    let cap = launch_time + chrono::Duration::milliseconds((total_max_hours * 3_600_000.0) as i64);
    new_expiry <= cap
}

pub fn is_expired(now: DateTime<Utc>, expiry_time: DateTime<Utc>) -> bool {
    now >= expiry_time
}

/// Node-loss timeout, shared across any non-terminal state: `cluster loss`
/// fails a reservation if its node has been unreachable past `T_node`.
pub fn node_loss_timed_out(last_seen: DateTime<Utc>, now: DateTime<Utc>, node_timeout_secs: i64) -> bool {
    (now - last_seen).num_seconds() > node_timeout_secs
}

/// `status` monotonicity as described in §8: true iff moving from `from` to
/// `to` never regresses through queued < pending < preparing < active, and
/// never leaves a terminal state once entered.
pub fn is_monotonic_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    use ReservationStatus::*;
    if from.is_terminal() {
        return false;
    }
    match (from, to) {
        (Queued, Pending) | (Queued, Cancelled) | (Queued, Failed) => true,
        (Pending, Preparing) | (Pending, Cancelled) | (Pending, Failed) => true,
        (Preparing, Active) | (Preparing, Cancelled) | (Preparing, Failed) => true,
        (Active, Cancelled) | (Active, Expired) | (Active, Failed) => true,
        (Active, Active) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn admission_guard_only_from_queued() {
        assert!(can_admit(ReservationStatus::Queued));
        assert!(!can_admit(ReservationStatus::Pending));
    }

    #[test]
    fn cancel_allowed_in_any_non_terminal_state() {
        assert!(can_cancel(ReservationStatus::Queued));
        assert!(can_cancel(ReservationStatus::Active));
        assert!(!can_cancel(ReservationStatus::Cancelled));
        assert!(!can_cancel(ReservationStatus::Expired));
        assert!(!can_cancel(ReservationStatus::Failed));
    }

    #[test]
    fn extension_at_exact_cap_succeeds_one_second_more_fails() {
        let launch = Utc::now();
        let at_cap = launch + Duration::hours(48);
        assert!(extension_allowed(launch, at_cap, 48.0));
        assert!(!extension_allowed(launch, at_cap + Duration::seconds(1), 48.0));
    }

    #[test]
    fn monotonic_table_rejects_regression_and_skip() {
        assert!(is_monotonic_transition(
            ReservationStatus::Queued,
            ReservationStatus::Pending
        ));
        assert!(!is_monotonic_transition(
            ReservationStatus::Preparing,
            ReservationStatus::Queued
        ));
        assert!(!is_monotonic_transition(
            ReservationStatus::Queued,
            ReservationStatus::Active
        ));
    }

    #[test]
    fn terminal_states_never_transition_again() {
        assert!(!is_monotonic_transition(
            ReservationStatus::Cancelled,
            ReservationStatus::Active
        ));
        assert!(!is_monotonic_transition(
            ReservationStatus::Expired,
            ReservationStatus::Failed
        ));
    }

    #[test]
    fn admission_timeout_boundary() {
        let entered = Utc::now() - Duration::seconds(601);
        assert!(admission_timed_out(entered, Utc::now(), 600));
        let entered = Utc::now() - Duration::seconds(599);
        assert!(!admission_timed_out(entered, Utc::now(), 600));
    }
}
