//! Domain records owned by the service.

mod prescription;
mod training;

pub use prescription::{NewPrescription, Prescription, ValidationError, MAX_DIAGNOSIS_CHARS};
pub use training::{NewTrainingMetadata, TrainingMetadata};
