use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on the diagnosis length, in characters.
pub const MAX_DIAGNOSIS_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A prescription before it has been persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewPrescription {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub diagnosis: String,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub dosage: Map<String, Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewPrescription {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let len = self.diagnosis.chars().count();
        if len == 0 {
            return Err(ValidationError::new("diagnosis", "must not be empty"));
        }
        if len > MAX_DIAGNOSIS_CHARS {
            return Err(ValidationError::new(
                "diagnosis",
                format!("must be at most {MAX_DIAGNOSIS_CHARS} characters"),
            ));
        }
        Ok(())
    }
}

/// A persisted prescription.
///
/// `id`, the timestamps and `version` are assigned by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub symptoms: Vec<String>,
    pub diagnosis: String,
    pub medications: Vec<String>,
    pub dosage: Map<String, Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

impl Prescription {
    /// Materialize a new record at version 1.
    pub fn create(new: NewPrescription, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id: new.appointment_id,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            symptoms: new.symptoms,
            diagnosis: new.diagnosis,
            medications: new.medications,
            dosage: new.dosage,
            notes: new.notes,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Record a modification: refresh `updated_at` and bump the version.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }

    /// Space-joined symptoms, the training text for this record.
    pub fn symptom_text(&self) -> String {
        self.symptoms.join(" ")
    }
}
