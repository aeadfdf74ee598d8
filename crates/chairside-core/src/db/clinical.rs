//! Clinical record cache repository: sessions, payments, photos

use async_trait::async_trait;
use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{Payment, Photo, TreatmentSession};

/// Trait for the clinical cache tables
#[async_trait]
pub trait ClinicalRepository {
    async fn upsert_session(&self, session: &TreatmentSession) -> Result<()>;
    async fn get_session(&self, id: i64) -> Result<Option<TreatmentSession>>;
    /// Sessions for a patient, newest visit first
    async fn sessions_for_patient(&self, patient_id: i64) -> Result<Vec<TreatmentSession>>;
    async fn delete_session(&self, id: i64) -> Result<()>;

    async fn upsert_payment(&self, payment: &Payment) -> Result<()>;
    /// Payments for a patient, newest first
    async fn payments_for_patient(&self, patient_id: i64) -> Result<Vec<Payment>>;

    async fn upsert_photo(&self, photo: &Photo) -> Result<()>;
    /// Photo metadata for a patient, newest first
    async fn photos_for_patient(&self, patient_id: i64) -> Result<Vec<Photo>>;
}

/// libSQL implementation of `ClinicalRepository`
pub struct LibSqlClinicalRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlClinicalRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_session(row: &libsql::Row) -> Result<TreatmentSession> {
        let treatments_json: String = row.get(4)?;

        Ok(TreatmentSession {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            doctor: row.get(2)?,
            diagnosis: row.get(3)?,
            treatments: serde_json::from_str(&treatments_json)?,
            total_cost_cents: row.get(5)?,
            performed_at: row.get(6)?,
        })
    }

    fn parse_payment(row: &libsql::Row) -> Result<Payment> {
        let method: String = row.get(4)?;

        Ok(Payment {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            session_id: row.get(2)?,
            amount_cents: row.get(3)?,
            method: method.parse()?,
            paid_at: row.get(5)?,
        })
    }

    fn parse_photo(row: &libsql::Row) -> Result<Photo> {
        Ok(Photo {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            remote_key: row.get(2)?,
            caption: row.get(3)?,
            taken_at: row.get(4)?,
        })
    }
}

#[async_trait]
impl ClinicalRepository for LibSqlClinicalRepository<'_> {
    async fn upsert_session(&self, session: &TreatmentSession) -> Result<()> {
        let treatments_json = serde_json::to_string(&session.treatments)?;

        self.conn
            .execute(
                "INSERT INTO sessions (id, patient_id, doctor, diagnosis, treatments_json, total_cost_cents, performed_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     patient_id = excluded.patient_id,
                     doctor = excluded.doctor,
                     diagnosis = excluded.diagnosis,
                     treatments_json = excluded.treatments_json,
                     total_cost_cents = excluded.total_cost_cents,
                     performed_at = excluded.performed_at",
                params![
                    session.id,
                    session.patient_id,
                    session.doctor.as_str(),
                    session.diagnosis.clone(),
                    treatments_json,
                    session.total_cost_cents,
                    session.performed_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_session(&self, id: i64) -> Result<Option<TreatmentSession>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, patient_id, doctor, diagnosis, treatments_json, total_cost_cents, performed_at
                 FROM sessions WHERE id = ?",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_session(&row)?)),
            None => Ok(None),
        }
    }

    async fn sessions_for_patient(&self, patient_id: i64) -> Result<Vec<TreatmentSession>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, patient_id, doctor, diagnosis, treatments_json, total_cost_cents, performed_at
                 FROM sessions
                 WHERE patient_id = ?
                 ORDER BY performed_at DESC",
                params![patient_id],
            )
            .await?;

        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await? {
            sessions.push(Self::parse_session(&row)?);
        }

        Ok(sessions)
    }

    async fn delete_session(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?", params![id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("session {id}")));
        }

        Ok(())
    }

    async fn upsert_payment(&self, payment: &Payment) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO payments (id, patient_id, session_id, amount_cents, method, paid_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     patient_id = excluded.patient_id,
                     session_id = excluded.session_id,
                     amount_cents = excluded.amount_cents,
                     method = excluded.method,
                     paid_at = excluded.paid_at",
                params![
                    payment.id,
                    payment.patient_id,
                    payment.session_id,
                    payment.amount_cents,
                    payment.method.as_str(),
                    payment.paid_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn payments_for_patient(&self, patient_id: i64) -> Result<Vec<Payment>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, patient_id, session_id, amount_cents, method, paid_at
                 FROM payments
                 WHERE patient_id = ?
                 ORDER BY paid_at DESC",
                params![patient_id],
            )
            .await?;

        let mut payments = Vec::new();
        while let Some(row) = rows.next().await? {
            payments.push(Self::parse_payment(&row)?);
        }

        Ok(payments)
    }

    async fn upsert_photo(&self, photo: &Photo) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO photos (id, patient_id, remote_key, caption, taken_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     patient_id = excluded.patient_id,
                     remote_key = excluded.remote_key,
                     caption = excluded.caption,
                     taken_at = excluded.taken_at",
                params![
                    photo.id,
                    photo.patient_id,
                    photo.remote_key.as_str(),
                    photo.caption.clone(),
                    photo.taken_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn photos_for_patient(&self, patient_id: i64) -> Result<Vec<Photo>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, patient_id, remote_key, caption, taken_at
                 FROM photos
                 WHERE patient_id = ?
                 ORDER BY taken_at DESC",
                params![patient_id],
            )
            .await?;

        let mut photos = Vec::new();
        while let Some(row) = rows.next().await? {
            photos.push(Self::parse_photo(&row)?);
        }

        Ok(photos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{PaymentMethod, TreatmentItem};

    fn session(id: i64, patient_id: i64, performed_at: i64) -> TreatmentSession {
        TreatmentSession {
            id,
            patient_id,
            doctor: "dr.ilie".to_string(),
            diagnosis: Some("caries".to_string()),
            treatments: vec![TreatmentItem {
                name: "filling".to_string(),
                tooth: Some("36".to_string()),
                cost_cents: 25_000,
            }],
            total_cost_cents: 25_000,
            performed_at,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn session_roundtrip_preserves_treatments() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClinicalRepository::new(db.connection());

        let created = session(1, 7, 100);
        repo.upsert_session(&created).await.unwrap();

        let fetched = repo.get_session(1).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.treatments[0].tooth.as_deref(), Some("36"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sessions_for_patient_filters_and_orders() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClinicalRepository::new(db.connection());

        repo.upsert_session(&session(1, 7, 100)).await.unwrap();
        repo.upsert_session(&session(2, 7, 300)).await.unwrap();
        repo.upsert_session(&session(3, 8, 200)).await.unwrap();

        let visits = repo.sessions_for_patient(7).await.unwrap();
        let ids: Vec<i64> = visits.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn payment_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClinicalRepository::new(db.connection());

        let payment = Payment {
            id: 1,
            patient_id: 7,
            session_id: Some(3),
            amount_cents: 25_000,
            method: PaymentMethod::Card,
            paid_at: 400,
        };
        repo.upsert_payment(&payment).await.unwrap();

        let payments = repo.payments_for_patient(7).await.unwrap();
        assert_eq!(payments, vec![payment]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn photo_roundtrip_without_caption() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClinicalRepository::new(db.connection());

        let photo = Photo {
            id: 1,
            patient_id: 7,
            remote_key: "photos/7/panoramic.jpg".to_string(),
            caption: None,
            taken_at: 900,
        };
        repo.upsert_photo(&photo).await.unwrap();

        let photos = repo.photos_for_patient(7).await.unwrap();
        assert_eq!(photos, vec![photo]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_missing_session_is_an_error() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlClinicalRepository::new(db.connection());

        let error = repo.delete_session(99).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
