//! Patient model

use serde::{Deserialize, Serialize};

/// A patient record mirrored from the remote API.
///
/// The local row is a cache entry keyed by the remote identifier; the remote
/// API stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    /// Remote identifier
    pub id: i64,
    /// Human-facing chart code (e.g. `P-0042`), unique per clinic
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// ISO date (`YYYY-MM-DD`)
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Last remote update (Unix ms)
    pub updated_at: i64,
}

impl Patient {
    /// Display name, last name first.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_puts_last_name_first() {
        let patient = Patient {
            id: 1,
            code: "P-0001".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Varga".to_string(),
            phone: None,
            birth_date: None,
            note: None,
            updated_at: 0,
        };
        assert_eq!(patient.full_name(), "Varga Ana");
    }

    #[test]
    fn deserializes_with_missing_optional_fields() {
        let patient: Patient = serde_json::from_str(
            r#"{"id": 7, "code": "P-0007", "first_name": "Ion", "last_name": "Pop", "updated_at": 123}"#,
        )
        .unwrap();
        assert_eq!(patient.id, 7);
        assert_eq!(patient.phone, None);
    }
}
