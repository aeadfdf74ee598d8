//! Patient cache repository

use async_trait::async_trait;
use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::Patient;

/// Trait for the patient cache table
#[async_trait]
pub trait PatientRepository {
    /// Insert or replace a patient row fetched from the remote API
    async fn upsert(&self, patient: &Patient) -> Result<()>;

    /// Get a patient by remote id
    async fn get(&self, id: i64) -> Result<Option<Patient>>;

    /// Look up a patient by chart code
    async fn get_by_code(&self, code: &str) -> Result<Option<Patient>>;

    /// List patients, most recently updated first
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Patient>>;

    /// Drop a patient from the cache
    async fn delete(&self, id: i64) -> Result<()>;

    /// Number of cached patients
    async fn count(&self) -> Result<usize>;
}

/// libSQL implementation of `PatientRepository`
pub struct LibSqlPatientRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPatientRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_patient(row: &libsql::Row) -> Result<Patient> {
        Ok(Patient {
            id: row.get(0)?,
            code: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            phone: row.get(4)?,
            birth_date: row.get(5)?,
            note: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

const PATIENT_COLUMNS: &str = "id, code, first_name, last_name, phone, birth_date, note, updated_at";

#[async_trait]
impl PatientRepository for LibSqlPatientRepository<'_> {
    async fn upsert(&self, patient: &Patient) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO patients (id, code, first_name, last_name, phone, birth_date, note, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     code = excluded.code,
                     first_name = excluded.first_name,
                     last_name = excluded.last_name,
                     phone = excluded.phone,
                     birth_date = excluded.birth_date,
                     note = excluded.note,
                     updated_at = excluded.updated_at",
                params![
                    patient.id,
                    patient.code.as_str(),
                    patient.first_name.as_str(),
                    patient.last_name.as_str(),
                    patient.phone.clone(),
                    patient.birth_date.clone(),
                    patient.note.clone(),
                    patient.updated_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<Patient>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"),
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_patient(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Patient>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE code = ?"),
                params![code],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_patient(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Patient>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PATIENT_COLUMNS} FROM patients
                     ORDER BY updated_at DESC
                     LIMIT ? OFFSET ?"
                ),
                params![limit as i64, offset as i64],
            )
            .await?;

        let mut patients = Vec::new();
        while let Some(row) = rows.next().await? {
            patients.push(Self::parse_patient(&row)?);
        }

        Ok(patients)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?", params![id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("patient {id}")));
        }

        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM patients", ()).await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn patient(id: i64, code: &str, updated_at: i64) -> Patient {
        Patient {
            id,
            code: code.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Varga".to_string(),
            phone: Some("0722 000 000".to_string()),
            birth_date: Some("1988-04-12".to_string()),
            note: None,
            updated_at,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_and_get_roundtrip() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlPatientRepository::new(db.connection());

        let created = patient(1, "P-0001", 100);
        repo.upsert(&created).await.unwrap();

        let fetched = repo.get(1).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_replaces_existing_row() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlPatientRepository::new(db.connection());

        repo.upsert(&patient(1, "P-0001", 100)).await.unwrap();

        let mut renamed = patient(1, "P-0001", 200);
        renamed.last_name = "Varga-Pop".to_string();
        repo.upsert(&renamed).await.unwrap();

        let fetched = repo.get(1).await.unwrap().unwrap();
        assert_eq!(fetched.last_name, "Varga-Pop");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_by_code_uses_chart_code() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlPatientRepository::new(db.connection());

        repo.upsert(&patient(1, "P-0001", 100)).await.unwrap();
        repo.upsert(&patient(2, "P-0002", 100)).await.unwrap();

        let fetched = repo.get_by_code("P-0002").await.unwrap().unwrap();
        assert_eq!(fetched.id, 2);
        assert!(repo.get_by_code("P-9999").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_orders_by_recent_update() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlPatientRepository::new(db.connection());

        repo.upsert(&patient(1, "P-0001", 100)).await.unwrap();
        repo.upsert(&patient(2, "P-0002", 300)).await.unwrap();
        repo.upsert(&patient(3, "P-0003", 200)).await.unwrap();

        let listed = repo.list(2, 0).await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_missing_patient_is_an_error() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlPatientRepository::new(db.connection());

        let error = repo.delete(42).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }
}
