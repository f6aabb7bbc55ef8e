//! Command and query handlers, one module per feature.
//!
//! Each module defines its request type(s), the response shape and the
//! `Handler` impl on the mediator. Writes persist first and publish second;
//! a failed write never publishes.

pub mod create_prescription;
pub mod get_prescription;
pub mod suggest_prescription;
pub mod train_model;

pub use create_prescription::{CreatePrescription, PrescriptionResponse};
pub use get_prescription::{GetPrescriptionById, GetPrescriptionsByPatient, PrescriptionListResponse};
pub use suggest_prescription::{
    SuggestPrescription, SuggestPrescriptionResponse, SuggestionSource, FALLBACK_DIAGNOSIS,
    FALLBACK_NOTES,
};
pub use train_model::{TrainModel, TrainModelResponse};
