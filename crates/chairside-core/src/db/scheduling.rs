//! Scheduling cache repository: appointments, doctor schedules, activity log

use async_trait::async_trait;
use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{ActivityEntry, Appointment, DoctorSchedule};
use crate::util::now_millis;

/// Trait for the scheduling cache tables
#[async_trait]
pub trait SchedulingRepository {
    async fn upsert_appointment(&self, appointment: &Appointment) -> Result<()>;
    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>>;
    /// Appointments on a UTC calendar day (`YYYY-MM-DD`), earliest first
    async fn appointments_for_day(&self, day: &str) -> Result<Vec<Appointment>>;
    async fn delete_appointment(&self, id: i64) -> Result<()>;

    /// Replace the full weekly schedule of one doctor
    async fn replace_schedule(&self, doctor: &str, windows: &[DoctorSchedule]) -> Result<()>;
    async fn schedule_for_doctor(&self, doctor: &str) -> Result<Vec<DoctorSchedule>>;

    /// Append one audit trail entry
    async fn record_activity(
        &self,
        actor: &str,
        action: &str,
        entity: &str,
        entity_id: &str,
    ) -> Result<()>;
    /// Most recent audit entries
    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>>;
}

/// libSQL implementation of `SchedulingRepository`
pub struct LibSqlSchedulingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSchedulingRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_appointment(row: &libsql::Row) -> Result<Appointment> {
        let status: String = row.get(6)?;

        Ok(Appointment {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            doctor: row.get(2)?,
            scheduled_at: row.get(3)?,
            // column 4 is scheduled_day, derived from scheduled_at
            duration_min: row.get(5)?,
            status: status.parse()?,
            note: row.get(7)?,
        })
    }

    fn parse_schedule(row: &libsql::Row) -> Result<DoctorSchedule> {
        let weekday: i64 = row.get(2)?;
        let start_minute: i64 = row.get(3)?;
        let end_minute: i64 = row.get(4)?;

        Ok(DoctorSchedule {
            id: row.get(0)?,
            doctor: row.get(1)?,
            weekday: u8::try_from(weekday)
                .map_err(|_| Error::Database(format!("weekday out of range: {weekday}")))?,
            start_minute: u16::try_from(start_minute)
                .map_err(|_| Error::Database(format!("start minute out of range: {start_minute}")))?,
            end_minute: u16::try_from(end_minute)
                .map_err(|_| Error::Database(format!("end minute out of range: {end_minute}")))?,
        })
    }

    fn parse_activity(row: &libsql::Row) -> Result<ActivityEntry> {
        Ok(ActivityEntry {
            id: row.get(0)?,
            actor: row.get(1)?,
            action: row.get(2)?,
            entity: row.get(3)?,
            entity_id: row.get(4)?,
            recorded_at: row.get(5)?,
        })
    }
}

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, doctor, scheduled_at, scheduled_day, duration_min, status, note";

#[async_trait]
impl SchedulingRepository for LibSqlSchedulingRepository<'_> {
    async fn upsert_appointment(&self, appointment: &Appointment) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO appointments (id, patient_id, doctor, scheduled_at, scheduled_day, duration_min, status, note)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     patient_id = excluded.patient_id,
                     doctor = excluded.doctor,
                     scheduled_at = excluded.scheduled_at,
                     scheduled_day = excluded.scheduled_day,
                     duration_min = excluded.duration_min,
                     status = excluded.status,
                     note = excluded.note",
                params![
                    appointment.id,
                    appointment.patient_id,
                    appointment.doctor.as_str(),
                    appointment.scheduled_at,
                    appointment.scheduled_day(),
                    appointment.duration_min,
                    appointment.status.as_str(),
                    appointment.note.clone()
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_appointment(&self, id: i64) -> Result<Option<Appointment>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?"),
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_appointment(&row)?)),
            None => Ok(None),
        }
    }

    async fn appointments_for_day(&self, day: &str) -> Result<Vec<Appointment>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                     WHERE scheduled_day = ?
                     ORDER BY scheduled_at ASC"
                ),
                params![day],
            )
            .await?;

        let mut appointments = Vec::new();
        while let Some(row) = rows.next().await? {
            appointments.push(Self::parse_appointment(&row)?);
        }

        Ok(appointments)
    }

    async fn delete_appointment(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM appointments WHERE id = ?", params![id])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("appointment {id}")));
        }

        Ok(())
    }

    async fn replace_schedule(&self, doctor: &str, windows: &[DoctorSchedule]) -> Result<()> {
        self.conn
            .execute("DELETE FROM schedules WHERE doctor = ?", params![doctor])
            .await?;

        for window in windows {
            self.conn
                .execute(
                    "INSERT INTO schedules (id, doctor, weekday, start_minute, end_minute)
                     VALUES (?, ?, ?, ?, ?)",
                    params![
                        window.id,
                        window.doctor.as_str(),
                        i64::from(window.weekday),
                        i64::from(window.start_minute),
                        i64::from(window.end_minute)
                    ],
                )
                .await?;
        }

        Ok(())
    }

    async fn schedule_for_doctor(&self, doctor: &str) -> Result<Vec<DoctorSchedule>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, doctor, weekday, start_minute, end_minute
                 FROM schedules
                 WHERE doctor = ?
                 ORDER BY weekday ASC, start_minute ASC",
                params![doctor],
            )
            .await?;

        let mut windows = Vec::new();
        while let Some(row) = rows.next().await? {
            windows.push(Self::parse_schedule(&row)?);
        }

        Ok(windows)
    }

    async fn record_activity(
        &self,
        actor: &str,
        action: &str,
        entity: &str,
        entity_id: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO activity_log (actor, action, entity, entity_id, recorded_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![actor, action, entity, entity_id, now_millis()],
            )
            .await?;
        Ok(())
    }

    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, actor, action, entity, entity_id, recorded_at
                 FROM activity_log
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT ?",
                params![limit as i64],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_activity(&row)?);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::AppointmentStatus;

    fn appointment(id: i64, scheduled_at: i64) -> Appointment {
        Appointment {
            id,
            patient_id: 7,
            doctor: "dr.ilie".to_string(),
            scheduled_at,
            duration_min: 30,
            status: AppointmentStatus::Scheduled,
            note: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn appointments_for_day_uses_calendar_day() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSchedulingRepository::new(db.connection());

        // 2024-03-05T09:30Z and 2024-03-05T08:00Z, plus one on another day
        repo.upsert_appointment(&appointment(1, 1_709_631_000_000))
            .await
            .unwrap();
        repo.upsert_appointment(&appointment(2, 1_709_625_600_000))
            .await
            .unwrap();
        repo.upsert_appointment(&appointment(3, 1_709_712_000_000))
            .await
            .unwrap();

        let day = repo.appointments_for_day("2024-03-05").await.unwrap();
        let ids: Vec<i64> = day.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn appointment_roundtrip_preserves_status() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSchedulingRepository::new(db.connection());

        let mut booked = appointment(1, 1_709_631_000_000);
        booked.status = AppointmentStatus::Confirmed;
        booked.note = Some("recall".to_string());
        repo.upsert_appointment(&booked).await.unwrap();

        let fetched = repo.get_appointment(1).await.unwrap().unwrap();
        assert_eq!(fetched, booked);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn replace_schedule_swaps_windows_for_one_doctor() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSchedulingRepository::new(db.connection());

        let monday = DoctorSchedule {
            id: 1,
            doctor: "dr.ilie".to_string(),
            weekday: 0,
            start_minute: 9 * 60,
            end_minute: 14 * 60,
        };
        let other = DoctorSchedule {
            id: 2,
            doctor: "dr.moga".to_string(),
            weekday: 2,
            start_minute: 12 * 60,
            end_minute: 18 * 60,
        };
        repo.replace_schedule("dr.ilie", &[monday.clone()])
            .await
            .unwrap();
        repo.replace_schedule("dr.moga", &[other]).await.unwrap();

        let friday = DoctorSchedule {
            id: 3,
            doctor: "dr.ilie".to_string(),
            weekday: 4,
            start_minute: 10 * 60,
            end_minute: 16 * 60,
        };
        repo.replace_schedule("dr.ilie", &[friday.clone()])
            .await
            .unwrap();

        let windows = repo.schedule_for_doctor("dr.ilie").await.unwrap();
        assert_eq!(windows, vec![friday]);
        assert_eq!(repo.schedule_for_doctor("dr.moga").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn activity_log_returns_recent_entries_first() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSchedulingRepository::new(db.connection());

        repo.record_activity("reception", "create", "patient", "7")
            .await
            .unwrap();
        repo.record_activity("reception", "enqueue", "payment", "12")
            .await
            .unwrap();

        let entries = repo.recent_activity(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity, "payment");
        assert_eq!(entries[1].entity, "patient");
    }
}
