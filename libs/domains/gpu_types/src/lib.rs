//! GPU-type catalog domain.
//!
//! Holds the static and AR-maintained dynamic columns described for the
//! `gpu_types` table, plus the transaction-scoped admission helper the
//! Reservation Processor shares with the reservation state machine.

pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod txn;

pub use error::{GpuTypeError, GpuTypeResult};
pub use models::{AdmissionDecision, AvailabilityUpdate, GpuType};
pub use postgres::PgGpuTypeRepository;
pub use repository::GpuTypeRepository;
