//! Local durable store for Chairside
//!
//! Entity tables are a cache of remote state (the API stays authoritative);
//! `sync_queue` is the durable FIFO of writes awaiting replay.

mod clinical;
mod connection;
mod migrations;
mod patients;
mod queue;
mod scheduling;

pub use clinical::{ClinicalRepository, LibSqlClinicalRepository};
pub use connection::Database;
pub use patients::{LibSqlPatientRepository, PatientRepository};
pub use queue::{LibSqlQueueRepository, QueueRepository};
pub use scheduling::{LibSqlSchedulingRepository, SchedulingRepository};
