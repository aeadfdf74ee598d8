//! Scheduling models: appointments, doctor schedules, activity log

use std::fmt;
use std::str::FromStr;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown appointment status: {other}"
            ))),
        }
    }
}

/// A booked chair slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub doctor: String,
    /// Unix ms
    pub scheduled_at: i64,
    pub duration_min: i64,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub note: Option<String>,
}

impl Appointment {
    /// Calendar day of the slot in UTC (`YYYY-MM-DD`), used for the
    /// by-date index.
    #[must_use]
    pub fn scheduled_day(&self) -> String {
        Utc.timestamp_millis_opt(self.scheduled_at)
            .single()
            .map_or_else(String::new, |when| when.format("%Y-%m-%d").to_string())
    }
}

/// Recurring weekly availability window for a doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: i64,
    pub doctor: String,
    /// 0 = Monday .. 6 = Sunday
    pub weekday: u8,
    /// Minutes from midnight
    pub start_minute: u16,
    pub end_minute: u16,
}

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    /// Unix ms
    pub recorded_at: i64,
}
