//! Clinical record models: treatment sessions, payments, photos

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One treatment performed within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentItem {
    pub name: String,
    /// FDI tooth notation (e.g. `36`), absent for whole-mouth work
    #[serde(default)]
    pub tooth: Option<String>,
    pub cost_cents: i64,
}

/// A visit during which treatments were performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentSession {
    pub id: i64,
    pub patient_id: i64,
    pub doctor: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
    pub treatments: Vec<TreatmentItem>,
    pub total_cost_cents: i64,
    /// Unix ms
    pub performed_at: i64,
}

impl TreatmentSession {
    /// Sum of the individual treatment costs.
    ///
    /// The remote API computes `total_cost_cents` itself; this is the local
    /// cross-check used when displaying cached rows.
    #[must_use]
    pub fn computed_total_cents(&self) -> i64 {
        self.treatments.iter().map(|item| item.cost_cents).sum()
    }
}

/// Payment method accepted at the front desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "transfer" => Ok(Self::Transfer),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

/// A payment registered against a patient, optionally tied to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub patient_id: i64,
    #[serde(default)]
    pub session_id: Option<i64>,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Unix ms
    pub paid_at: i64,
}

/// Metadata for a clinical photo stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub patient_id: i64,
    /// Object key on the remote media store
    pub remote_key: String,
    #[serde(default)]
    pub caption: Option<String>,
    /// Unix ms
    pub taken_at: i64,
}
