//! Domain models shared across the store, sync engine, and interfaces

mod clinical;
mod operation;
mod patient;
mod scheduling;

pub use clinical::{Payment, PaymentMethod, Photo, TreatmentItem, TreatmentSession};
pub use operation::{NewSyncOperation, SyncOperation, WriteMethod};
pub use patient::Patient;
pub use scheduling::{ActivityEntry, Appointment, AppointmentStatus, DoctorSchedule};
