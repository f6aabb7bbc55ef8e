use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::create_prescription::PrescriptionResponse;
use crate::error::ServiceError;
use crate::mediator::{Handler, Mediator, Request};

pub struct GetPrescriptionById {
    pub id: Uuid,
}

impl Request for GetPrescriptionById {
    type Response = PrescriptionResponse;
    const NAME: &'static str = "GetPrescriptionById";
}

pub struct GetPrescriptionsByPatient {
    pub patient_id: Uuid,
}

impl Request for GetPrescriptionsByPatient {
    type Response = PrescriptionListResponse;
    const NAME: &'static str = "GetPrescriptionsByPatient";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionListResponse {
    pub items: Vec<PrescriptionResponse>,
    pub total: usize,
}

#[async_trait]
impl Handler<GetPrescriptionById> for Mediator {
    async fn handle(&self, query: GetPrescriptionById) -> Result<PrescriptionResponse, ServiceError> {
        info!(prescription_id = %query.id, "get prescription by id");
        self.context()
            .prescriptions()
            .get_by_id(query.id)
            .await?
            .map(PrescriptionResponse::from)
            .ok_or_else(|| ServiceError::NotFound("Prescription not found".into()))
    }
}

#[async_trait]
impl Handler<GetPrescriptionsByPatient> for Mediator {
    async fn handle(
        &self,
        query: GetPrescriptionsByPatient,
    ) -> Result<PrescriptionListResponse, ServiceError> {
        info!(patient_id = %query.patient_id, "get prescriptions by patient");
        let items: Vec<PrescriptionResponse> = self
            .context()
            .prescriptions()
            .get_by_patient_id(query.patient_id)
            .await?
            .into_iter()
            .map(PrescriptionResponse::from)
            .collect();
        Ok(PrescriptionListResponse {
            total: items.len(),
            items,
        })
    }
}
