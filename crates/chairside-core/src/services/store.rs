//! Shared store service wrapper used across interfaces.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    ClinicalRepository, Database, LibSqlClinicalRepository, LibSqlPatientRepository,
    LibSqlQueueRepository, LibSqlSchedulingRepository, PatientRepository, QueueRepository,
    SchedulingRepository,
};
use crate::models::{
    ActivityEntry, Appointment, DoctorSchedule, NewSyncOperation, Patient, Payment, Photo,
    SyncOperation, TreatmentSession,
};
use crate::Result;

/// Cached entity totals for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EntityCounts {
    pub patients: usize,
    pub pending_operations: usize,
}

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct StoreService {
    db: Arc<Mutex<Database>>,
}

impl StoreService {
    /// Open a store at the given filesystem path, creating parents as needed.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    // --- sync queue -------------------------------------------------------

    /// Append a pending write; failures propagate so a lost enqueue is
    /// never silent.
    pub async fn enqueue_operation(&self, operation: &NewSyncOperation) -> Result<i64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.append(operation).await
    }

    /// All pending writes, oldest first.
    pub async fn pending_operations(&self) -> Result<Vec<SyncOperation>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.pending().await
    }

    /// Number of pending writes.
    pub async fn queue_depth(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.depth().await
    }

    /// Remove a confirmed (or operator-dropped) write by id.
    pub async fn delete_operation(&self, id: i64) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.delete(id).await
    }

    // --- patients ---------------------------------------------------------

    pub async fn upsert_patient(&self, patient: &Patient) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlPatientRepository::new(db.connection());
        repo.upsert(patient).await
    }

    pub async fn get_patient(&self, id: i64) -> Result<Option<Patient>> {
        let db = self.db.lock().await;
        let repo = LibSqlPatientRepository::new(db.connection());
        repo.get(id).await
    }

    pub async fn find_patient_by_code(&self, code: &str) -> Result<Option<Patient>> {
        let db = self.db.lock().await;
        let repo = LibSqlPatientRepository::new(db.connection());
        repo.get_by_code(code).await
    }

    pub async fn list_patients(&self, limit: usize, offset: usize) -> Result<Vec<Patient>> {
        let db = self.db.lock().await;
        let repo = LibSqlPatientRepository::new(db.connection());
        repo.list(limit, offset).await
    }

    // --- clinical records -------------------------------------------------

    pub async fn upsert_session(&self, session: &TreatmentSession) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlClinicalRepository::new(db.connection());
        repo.upsert_session(session).await
    }

    pub async fn sessions_for_patient(&self, patient_id: i64) -> Result<Vec<TreatmentSession>> {
        let db = self.db.lock().await;
        let repo = LibSqlClinicalRepository::new(db.connection());
        repo.sessions_for_patient(patient_id).await
    }

    pub async fn upsert_payment(&self, payment: &Payment) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlClinicalRepository::new(db.connection());
        repo.upsert_payment(payment).await
    }

    pub async fn payments_for_patient(&self, patient_id: i64) -> Result<Vec<Payment>> {
        let db = self.db.lock().await;
        let repo = LibSqlClinicalRepository::new(db.connection());
        repo.payments_for_patient(patient_id).await
    }

    pub async fn upsert_photo(&self, photo: &Photo) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlClinicalRepository::new(db.connection());
        repo.upsert_photo(photo).await
    }

    pub async fn photos_for_patient(&self, patient_id: i64) -> Result<Vec<Photo>> {
        let db = self.db.lock().await;
        let repo = LibSqlClinicalRepository::new(db.connection());
        repo.photos_for_patient(patient_id).await
    }

    // --- scheduling -------------------------------------------------------

    pub async fn upsert_appointment(&self, appointment: &Appointment) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSchedulingRepository::new(db.connection());
        repo.upsert_appointment(appointment).await
    }

    pub async fn appointments_for_day(&self, day: &str) -> Result<Vec<Appointment>> {
        let db = self.db.lock().await;
        let repo = LibSqlSchedulingRepository::new(db.connection());
        repo.appointments_for_day(day).await
    }

    pub async fn replace_schedule(
        &self,
        doctor: &str,
        windows: &[DoctorSchedule],
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSchedulingRepository::new(db.connection());
        repo.replace_schedule(doctor, windows).await
    }

    pub async fn schedule_for_doctor(&self, doctor: &str) -> Result<Vec<DoctorSchedule>> {
        let db = self.db.lock().await;
        let repo = LibSqlSchedulingRepository::new(db.connection());
        repo.schedule_for_doctor(doctor).await
    }

    pub async fn record_activity(
        &self,
        actor: &str,
        action: &str,
        entity: &str,
        entity_id: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSchedulingRepository::new(db.connection());
        repo.record_activity(actor, action, entity, entity_id).await
    }

    pub async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let db = self.db.lock().await;
        let repo = LibSqlSchedulingRepository::new(db.connection());
        repo.recent_activity(limit).await
    }

    // --- status -----------------------------------------------------------

    /// Totals shown by `chairside status`.
    pub async fn entity_counts(&self) -> Result<EntityCounts> {
        let db = self.db.lock().await;
        let patients = LibSqlPatientRepository::new(db.connection()).count().await?;
        let pending_operations = LibSqlQueueRepository::new(db.connection()).depth().await?;

        Ok(EntityCounts {
            patients,
            pending_operations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WriteMethod;
    use serde_json::Map;

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_and_scan_roundtrip() {
        let store = StoreService::open_in_memory().await.unwrap();

        let op = NewSyncOperation::new("patients", WriteMethod::Post, Map::new());
        let id = store.enqueue_operation(&op).await.unwrap();

        let pending = store.pending_operations().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(store.queue_depth().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clones_share_the_same_database() {
        let store = StoreService::open_in_memory().await.unwrap();
        let other = store.clone();

        let op = NewSyncOperation::new("payments", WriteMethod::Post, Map::new());
        store.enqueue_operation(&op).await.unwrap();

        assert_eq!(other.queue_depth().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn entity_counts_reflect_cache_contents() {
        let store = StoreService::open_in_memory().await.unwrap();

        let patient = Patient {
            id: 1,
            code: "P-0001".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Varga".to_string(),
            phone: None,
            birth_date: None,
            note: None,
            updated_at: 1,
        };
        store.upsert_patient(&patient).await.unwrap();

        let counts = store.entity_counts().await.unwrap();
        assert_eq!(counts.patients, 1);
        assert_eq!(counts.pending_operations, 0);
    }
}
