//! Volume catalog domain.
//!
//! Holds the user-owned disk rows described for the `volumes` table, plus
//! the transaction-scoped bind/unbind helpers the Reservation Processor
//! shares with the reservation state machine's disk-ops handling.

pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod txn;

pub use error::{VolumeError, VolumeResult};
pub use models::{BindOutcome, CloudVolumeSnapshot, CreateVolume, Volume, VolumeOperationStatus};
pub use postgres::PgVolumeRepository;
pub use repository::VolumeRepository;
