use async_trait::async_trait;

use crate::error::ReservationResult;
use crate::models::{CreateReservation, Reservation, ReservationPatch};

/// Read/write access to reservation rows outside of the admission fast-path
/// (which needs a shared transaction — see `txn::admit`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create(&self, input: CreateReservation) -> ReservationResult<Reservation>;

    async fn get_by_id(&self, id: &str) -> ReservationResult<Option<Reservation>>;

    async fn list_by_master(&self, master_reservation_id: &str) -> ReservationResult<Vec<Reservation>>;

    /// Every row in `active`, for EE's per-tick sweep.
    async fn list_active(&self) -> ReservationResult<Vec<Reservation>>;

    /// Every row in `pending`, for RP's admission-timeout sweep.
    async fn list_pending(&self) -> ReservationResult<Vec<Reservation>>;

    /// Every row in `preparing`, for RP's prepare-timeout sweep.
    async fn list_preparing(&self) -> ReservationResult<Vec<Reservation>>;

    async fn apply_patch(&self, id: &str, patch: ReservationPatch) -> ReservationResult<()>;
}
