//! Warning ladder, OOM accounting, expiry, and hard-deletion passes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloud_adapter::CloudAdapter;
use cluster_gateway::{ClusterGateway, NodeEvent};
use database::postgres::transaction_scope;
use domain_reservations::state_machine::{admission_timed_out, node_loss_timed_out, prepare_timed_out};
use domain_reservations::{Reservation, ReservationPatch, ReservationRepository, ReservationStatus, StatusHistoryEntry, WarningsSent};
use domain_volumes::VolumeRepository;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::Config;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub warnings_checked: usize,
    pub warnings_sent: usize,
    pub oom_checked: usize,
    pub oom_recorded: usize,
    pub oom_failed: usize,
    pub expired: usize,
    pub hard_deleted: usize,
    pub timed_out: usize,
    pub node_lost: usize,
    pub errors: usize,
}

pub struct Engine {
    pub db: DatabaseConnection,
    pub reservations: Arc<dyn ReservationRepository>,
    pub volumes: Arc<dyn VolumeRepository>,
    pub cluster: Arc<dyn ClusterGateway>,
    pub cloud: Arc<dyn CloudAdapter>,
    pub config: Arc<Config>,
}

/// One warning level to emit this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningAction {
    pub threshold_minutes: i64,
    pub file_name: String,
    pub broadcast: bool,
}

/// Pure ladder evaluation: which not-yet-sent thresholds have now elapsed,
/// in ascending order of minutes (so a missed tick fires 5 before 15 before
/// 30 when several have elapsed at once).
pub fn pending_warnings(
    expiry_time: DateTime<Utc>,
    now: DateTime<Utc>,
    warnings_sent: &WarningsSent,
    thresholds: &[i64],
) -> Vec<WarningAction> {
    let remaining_minutes = (expiry_time - now).num_seconds() as f64 / 60.0;

    let mut sorted = thresholds.to_vec();
    sorted.sort_unstable();

    sorted
        .into_iter()
        .filter(|&threshold| remaining_minutes <= threshold as f64)
        .filter(|&threshold| match threshold {
            30 => !warnings_sent.thirty_min,
            15 => !warnings_sent.fifteen_min,
            5 => !warnings_sent.five_min,
            _ => false,
        })
        .map(|threshold| WarningAction {
            threshold_minutes: threshold,
            file_name: format!("WARN_EXPIRES_IN_{threshold}MIN.txt"),
            broadcast: threshold != 30,
        })
        .collect()
}

fn mark_warning_sent(warnings_sent: &WarningsSent, threshold_minutes: i64) -> WarningsSent {
    let mut next = warnings_sent.clone();
    match threshold_minutes {
        30 => next.thirty_min = true,
        15 => next.fifteen_min = true,
        5 => next.five_min = true,
        _ => {}
    }
    next
}

/// The most recent OOM-kill event for this reservation's pod that the
/// reservation hasn't already accounted for.
pub fn latest_unseen_oom_event<'a>(events: &'a [NodeEvent], last_oom_at: Option<DateTime<Utc>>) -> Option<&'a NodeEvent> {
    events
        .iter()
        .filter(|e| e.reason.to_lowercase().contains("oom"))
        .filter(|e| last_oom_at.map_or(true, |t| e.timestamp > t))
        .max_by_key(|e| e.timestamp)
}

/// When a reservation last transitioned into `status`, falling back to
/// `created_at` if the history has no entry for it (e.g. a row seeded
/// before history tracking existed).
fn entered_status_at(reservation: &Reservation, status: ReservationStatus) -> DateTime<Utc> {
    reservation
        .status_history
        .iter()
        .rev()
        .find(|h| h.status == status)
        .map(|h| h.timestamp)
        .unwrap_or(reservation.created_at)
}

impl Engine {
    #[instrument(skip(self))]
    pub async fn run_tick(&self) -> RunStats {
        let mut stats = RunStats::default();

        let active = match self.reservations.list_active().await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "failed to list active reservations, skipping tick");
                stats.errors += 1;
                return stats;
            }
        };

        self.sweep_pending_timeouts(&mut stats).await;
        self.sweep_preparing_timeouts(&mut stats).await;

        for reservation in &active {
            self.check_warnings(reservation, &mut stats).await;
            self.check_oom(reservation, &mut stats).await;
            self.check_node_loss(reservation, &mut stats).await;
        }

        for reservation in &active {
            if let Some(expiry) = reservation.expiry_time {
                if Utc::now() >= expiry {
                    match self.expire_one(reservation).await {
                        Ok(()) => stats.expired += 1,
                        Err(err) => {
                            warn!(reservation_id = %reservation.id, error = %err, "expiry failed, retrying next tick");
                            stats.errors += 1;
                        }
                    }
                }
            }
        }

        match self.hard_delete_sweep().await {
            Ok(count) => stats.hard_deleted = count,
            Err(err) => {
                warn!(error = %err, "hard-deletion sweep failed");
                stats.errors += 1;
            }
        }

        info!(
            warnings_sent = stats.warnings_sent,
            oom_recorded = stats.oom_recorded,
            oom_failed = stats.oom_failed,
            expired = stats.expired,
            hard_deleted = stats.hard_deleted,
            timed_out = stats.timed_out,
            node_lost = stats.node_lost,
            errors = stats.errors,
            "expiry engine tick complete"
        );
        stats
    }

    /// `pending -> failed`: a reservation stuck waiting on admission past
    /// `admit_timeout_seconds`, e.g. the processor that owned it died.
    async fn sweep_pending_timeouts(&self, stats: &mut RunStats) {
        let pending = match self.reservations.list_pending().await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "failed to list pending reservations, skipping admission timeout sweep");
                stats.errors += 1;
                return;
            }
        };

        let now = Utc::now();
        for reservation in &pending {
            let entered_pending_at = entered_status_at(reservation, ReservationStatus::Pending);
            if !admission_timed_out(entered_pending_at, now, self.config.admit_timeout_seconds) {
                continue;
            }
            match self.fail_one(reservation, "admission timed out").await {
                Ok(()) => stats.timed_out += 1,
                Err(err) => {
                    warn!(reservation_id = %reservation.id, error = %err, "failed to fail timed-out pending reservation");
                    stats.errors += 1;
                }
            }
        }
    }

    /// `preparing -> failed`: a reservation stuck waiting on pod readiness
    /// past `prepare_timeout_seconds`, backstopping the processor's own
    /// in-request poll for the case where the process that owned it died.
    async fn sweep_preparing_timeouts(&self, stats: &mut RunStats) {
        let preparing = match self.reservations.list_preparing().await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "failed to list preparing reservations, skipping prepare timeout sweep");
                stats.errors += 1;
                return;
            }
        };

        let now = Utc::now();
        for reservation in &preparing {
            let entered_preparing_at = entered_status_at(reservation, ReservationStatus::Preparing);
            if !prepare_timed_out(entered_preparing_at, now, self.config.prepare_timeout_seconds) {
                continue;
            }
            match self.fail_one(reservation, "pod did not become ready before prepare deadline").await {
                Ok(()) => stats.timed_out += 1,
                Err(err) => {
                    warn!(reservation_id = %reservation.id, error = %err, "failed to fail timed-out preparing reservation");
                    stats.errors += 1;
                }
            }
        }
    }

    /// `active -> failed` on cluster/node loss: the reservation's pod is no
    /// longer visible to the cluster gateway and has been unreachable past
    /// `node_timeout_seconds` since its last confirmed status transition.
    async fn check_node_loss(&self, reservation: &Reservation, stats: &mut RunStats) {
        let (Some(namespace), Some(pod_name)) = (&reservation.namespace, &reservation.pod_name) else {
            return;
        };

        let status = match self.cluster.get_pod_status(namespace, pod_name).await {
            Ok(s) => s,
            Err(err) => {
                warn!(reservation_id = %reservation.id, error = %err, "failed to read pod status for node-loss check");
                return;
            }
        };

        if status.is_some() {
            return;
        }

        let last_seen = entered_status_at(reservation, ReservationStatus::Active);
        if !node_loss_timed_out(last_seen, Utc::now(), self.config.node_timeout_seconds) {
            return;
        }

        match self.fail_one(reservation, "node unreachable past the node-loss timeout").await {
            Ok(()) => stats.node_lost += 1,
            Err(err) => {
                warn!(reservation_id = %reservation.id, error = %err, "failed to fail reservation after node loss");
                stats.errors += 1;
            }
        }
    }

    /// Shared `-> failed` path for the admission/prepare/node-loss sweeps:
    /// flip status, release whatever volume is attached, leave the pod
    /// alone (either already gone or not ours to touch mid-failure).
    async fn fail_one(&self, reservation: &Reservation, reason: &str) -> eyre::Result<()> {
        let now = Utc::now();
        let patch = ReservationPatch {
            status: Some(ReservationStatus::Failed),
            append_history: Some(StatusHistoryEntry {
                status: ReservationStatus::Failed,
                timestamp: now,
                detail: Some(reason.to_string()),
            }),
            reservation_ended: Some(now),
            failure_reason: Some(reason.to_string()),
            ..Default::default()
        };

        let txn = transaction_scope(&self.db).await?;
        domain_reservations::txn::apply_patch_on(&txn, &reservation.id, patch).await?;
        txn.commit().await?;

        if let Some(volume_id) = reservation.volume_id {
            self.volumes.release(volume_id).await?;
        }

        Ok(())
    }

    async fn check_warnings(&self, reservation: &Reservation, stats: &mut RunStats) {
        let Some(expiry) = reservation.expiry_time else { return };
        stats.warnings_checked += 1;

        let actions = pending_warnings(expiry, Utc::now(), &reservation.warnings_sent, &self.config.warning_thresholds_minutes);
        if actions.is_empty() {
            return;
        }

        let (Some(namespace), Some(pod_name)) = (&reservation.namespace, &reservation.pod_name) else {
            return;
        };

        let mut warnings_sent = reservation.warnings_sent.clone();
        for action in actions {
            let path = format!("~/{}", action.file_name);
            let write_result = self.cluster.write_file(namespace, pod_name, &path, "").await;
            if let Err(err) = write_result {
                warn!(reservation_id = %reservation.id, threshold = action.threshold_minutes, error = %err, "failed to write warning file, will retry next tick");
                continue;
            }

            if action.broadcast {
                let message = format!("This reservation expires in {} minutes.", action.threshold_minutes);
                if let Err(err) = self.cluster.broadcast_message(namespace, pod_name, &message).await {
                    warn!(reservation_id = %reservation.id, threshold = action.threshold_minutes, error = %err, "failed to broadcast warning, will retry next tick");
                    continue;
                }
            }

            warnings_sent = mark_warning_sent(&warnings_sent, action.threshold_minutes);
            stats.warnings_sent += 1;
        }

        let patch = ReservationPatch {
            warnings_sent: Some(warnings_sent),
            last_warning_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(err) = self.reservations.apply_patch(&reservation.id, patch).await {
            warn!(reservation_id = %reservation.id, error = %err, "failed to persist warning state");
        }
    }

    async fn check_oom(&self, reservation: &Reservation, stats: &mut RunStats) {
        let (Some(namespace), Some(pod_name)) = (&reservation.namespace, &reservation.pod_name) else {
            return;
        };
        stats.oom_checked += 1;

        let events = match self.cluster.pod_events(namespace, pod_name).await {
            Ok(e) => e,
            Err(err) => {
                warn!(reservation_id = %reservation.id, error = %err, "failed to read pod events for oom check");
                return;
            }
        };

        let Some(event) = latest_unseen_oom_event(&events, reservation.last_oom_at) else {
            return;
        };

        let new_count = reservation.oom_count + 1;
        let mut patch = ReservationPatch {
            oom_count: Some(new_count),
            last_oom_at: Some(event.timestamp),
            oom_container: event.pod_name.clone(),
            ..Default::default()
        };

        if new_count > self.config.oom_rate_limit_count {
            patch.status = Some(ReservationStatus::Failed);
            patch.append_history = Some(StatusHistoryEntry {
                status: ReservationStatus::Failed,
                timestamp: Utc::now(),
                detail: Some(format!("oom rate limit exceeded: {new_count} kills")),
            });
            patch.reservation_ended = Some(Utc::now());
            patch.failure_reason = Some(format!("out-of-memory kill rate exceeded ({new_count} kills)"));
            stats.oom_failed += 1;
        } else {
            stats.oom_recorded += 1;
        }

        if let Err(err) = self.reservations.apply_patch(&reservation.id, patch).await {
            warn!(reservation_id = %reservation.id, error = %err, "failed to persist oom state");
        }
    }

    async fn expire_one(&self, reservation: &Reservation) -> eyre::Result<()> {
        let now = Utc::now();
        let patch = ReservationPatch {
            status: Some(ReservationStatus::Expired),
            append_history: Some(StatusHistoryEntry {
                status: ReservationStatus::Expired,
                timestamp: now,
                detail: None,
            }),
            reservation_ended: Some(now),
            ..Default::default()
        };

        let txn = transaction_scope(&self.db).await?;
        domain_reservations::txn::apply_patch_on(&txn, &reservation.id, patch).await?;
        txn.commit().await?;

        if let (Some(namespace), Some(pod_name)) = (&reservation.namespace, &reservation.pod_name) {
            if let Err(err) = self.cluster.delete_pod(namespace, pod_name).await {
                warn!(reservation_id = %reservation.id, error = %err, "pod delete failed during expiry, will retry next tick");
            }
        }

        if let Some(volume_id) = reservation.volume_id {
            if let Some(volume) = self.volumes.get_by_id(volume_id).await? {
                if let Some(cloud_volume_id) = &volume.cloud_volume_id {
                    if let Err(err) = self.cloud.create_snapshot(cloud_volume_id).await {
                        warn!(volume_id = %volume_id, error = %err, "snapshot on expiry failed, will retry next tick");
                    }
                }
            }
            self.volumes.release(volume_id).await?;
        }

        Ok(())
    }

    async fn hard_delete_sweep(&self) -> eyre::Result<usize> {
        let due = self.volumes.list_for_hard_deletion(Utc::now()).await?;
        let mut deleted = 0;

        for volume in due {
            let Some(cloud_volume_id) = &volume.cloud_volume_id else {
                self.volumes.purge(volume.id).await?;
                deleted += 1;
                continue;
            };

            match self.cloud.delete_volume(cloud_volume_id).await {
                Ok(()) => {
                    self.volumes.purge(volume.id).await?;
                    deleted += 1;
                }
                Err(err) => {
                    warn!(volume_id = %volume.id, error = %err, "hard deletion failed, will retry next tick");
                }
            }
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn warnings(thirty: bool, fifteen: bool, five: bool) -> WarningsSent {
        WarningsSent {
            thirty_min: thirty,
            fifteen_min: fifteen,
            five_min: five,
        }
    }

    #[test]
    fn fires_all_elapsed_thresholds_in_ascending_order_on_a_missed_tick() {
        let now = Utc::now();
        let expiry = now + Duration::seconds(14 * 60 + 30);
        let actions = pending_warnings(expiry, now, &warnings(false, false, false), &[30, 15, 5]);
        let minutes: Vec<i64> = actions.iter().map(|a| a.threshold_minutes).collect();
        assert_eq!(minutes, vec![15, 30]);
    }

    #[test]
    fn does_not_refire_an_already_sent_threshold() {
        let now = Utc::now();
        let expiry = now + Duration::minutes(20);
        let actions = pending_warnings(expiry, now, &warnings(true, false, false), &[30, 15, 5]);
        let minutes: Vec<i64> = actions.iter().map(|a| a.threshold_minutes).collect();
        assert_eq!(minutes, Vec::<i64>::new());
    }

    #[test]
    fn thirty_minute_warning_does_not_broadcast_but_others_do() {
        let now = Utc::now();
        let expiry = now + Duration::minutes(1);
        let actions = pending_warnings(expiry, now, &warnings(false, false, false), &[30, 15, 5]);
        let thirty = actions.iter().find(|a| a.threshold_minutes == 30).unwrap();
        let five = actions.iter().find(|a| a.threshold_minutes == 5).unwrap();
        assert!(!thirty.broadcast);
        assert!(five.broadcast);
    }

    #[test]
    fn latest_unseen_oom_event_ignores_events_at_or_before_last_oom_at() {
        let t0 = Utc::now();
        let events = vec![
            NodeEvent {
                node_name: "n1".to_string(),
                pod_name: Some("p1".to_string()),
                reason: "OOMKilling".to_string(),
                message: "killed".to_string(),
                timestamp: t0,
            },
            NodeEvent {
                node_name: "n1".to_string(),
                pod_name: Some("p1".to_string()),
                reason: "OOMKilling".to_string(),
                message: "killed again".to_string(),
                timestamp: t0 + Duration::seconds(5),
            },
        ];
        let found = latest_unseen_oom_event(&events, Some(t0));
        assert_eq!(found.unwrap().timestamp, t0 + Duration::seconds(5));

        let found = latest_unseen_oom_event(&events, Some(t0 + Duration::seconds(5)));
        assert!(found.is_none());
    }

    #[test]
    fn entered_status_at_finds_the_most_recent_matching_history_entry() {
        let t0 = Utc::now() - Duration::minutes(20);
        let t1 = Utc::now() - Duration::minutes(10);
        let reservation = Reservation {
            status_history: vec![
                StatusHistoryEntry { status: ReservationStatus::Queued, timestamp: t0 - Duration::minutes(5), detail: None },
                StatusHistoryEntry { status: ReservationStatus::Pending, timestamp: t0, detail: None },
                StatusHistoryEntry { status: ReservationStatus::Pending, timestamp: t1, detail: None },
            ],
            ..test_reservation()
        };
        assert_eq!(entered_status_at(&reservation, ReservationStatus::Pending), t1);
    }

    #[test]
    fn entered_status_at_falls_back_to_created_at_without_a_matching_entry() {
        let reservation = test_reservation();
        let created_at = reservation.created_at;
        assert_eq!(entered_status_at(&reservation, ReservationStatus::Preparing), created_at);
    }

    fn test_reservation() -> Reservation {
        Reservation {
            id: "res-1".to_string(),
            user_id: "user-1".to_string(),
            status: ReservationStatus::Pending,
            gpu_type: "a100".to_string(),
            gpu_count: 1,
            instance_type: "p4d.24xlarge".to_string(),
            duration_hours: 4.0,
            created_at: Utc::now() - Duration::minutes(30),
            launch_time: None,
            expiry_time: None,
            reservation_ended: None,
            pod_name: None,
            namespace: None,
            node_ip: None,
            node_public_port: None,
            node_private_ip: None,
            jupyter_enabled: false,
            jupyter_url: None,
            jupyter_port: None,
            jupyter_token: None,
            jupyter_error: None,
            volume_id: None,
            status_history: vec![],
            oom_count: 0,
            last_oom_at: None,
            oom_container: None,
            warnings_sent: WarningsSent { thirty_min: false, fifteen_min: false, five_min: false },
            last_warning_at: None,
            is_multinode: false,
            master_reservation_id: None,
            node_index: None,
            total_nodes: None,
            secondary_users: vec![],
            alb_arn: None,
            nlb_arn: None,
            jupyter_subdomain: None,
            failure_reason: None,
            env_vars: Default::default(),
            image: "image:latest".to_string(),
            preserve_entrypoint: false,
            github_user: None,
        }
    }

    #[test]
    fn latest_unseen_oom_event_ignores_non_oom_reasons() {
        let events = vec![NodeEvent {
            node_name: "n1".to_string(),
            pod_name: Some("p1".to_string()),
            reason: "Scheduled".to_string(),
            message: "scheduled".to_string(),
            timestamp: Utc::now(),
        }];
        assert!(latest_unseen_oom_event(&events, None).is_none());
    }
}
