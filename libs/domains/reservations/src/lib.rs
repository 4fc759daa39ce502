//! Reservation domain: the state machine, admission orchestration, and
//! message contracts the Reservation Processor drives to convergence.

pub mod entity;
pub mod error;
pub mod messages;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod state_machine;
pub mod streams;
pub mod txn;

pub use error::{ReservationError, ReservationResult};
pub use messages::{DiskOpJob, DiskOpMessage, ReservationJob, ReservationMessage, ReservePayload};
pub use models::{
    AdmitOutcome, CreateReservation, Reservation, ReservationPatch, ReservationStatus,
    StatusHistoryEntry, WarningsSent,
};
pub use postgres::PgReservationRepository;
pub use repository::ReservationRepository;
pub use streams::{DiskOpsStream, ReservationsStream};
