//! Dependencies shared by every handler.

use std::sync::Arc;

use crate::bus::EventPublisher;
use crate::config::Settings;
use crate::llm::SuggestionClient;
use crate::repository::{
    InMemoryPrescriptionRepository, InMemoryTrainingMetadataRepository, PrescriptionRepository,
    TrainingMetadataRepository,
};

/// Handler context: repositories, the event publisher, the optional LLM
/// client and settings. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    prescriptions: Arc<dyn PrescriptionRepository>,
    training_runs: Arc<dyn TrainingMetadataRepository>,
    publisher: Arc<dyn EventPublisher>,
    llm: Option<Arc<dyn SuggestionClient>>,
    settings: Arc<Settings>,
}

impl Context {
    /// A context over fresh in-memory repositories and no LLM client.
    pub fn new(settings: Arc<Settings>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            prescriptions: Arc::new(InMemoryPrescriptionRepository::new()),
            training_runs: Arc::new(InMemoryTrainingMetadataRepository::new()),
            publisher,
            llm: None,
            settings,
        }
    }

    pub fn with_prescriptions(mut self, repo: Arc<dyn PrescriptionRepository>) -> Self {
        self.prescriptions = repo;
        self
    }

    pub fn with_training_runs(mut self, repo: Arc<dyn TrainingMetadataRepository>) -> Self {
        self.training_runs = repo;
        self
    }

    pub fn with_llm(mut self, client: Arc<dyn SuggestionClient>) -> Self {
        self.llm = Some(client);
        self
    }

    pub fn prescriptions(&self) -> &dyn PrescriptionRepository {
        self.prescriptions.as_ref()
    }

    pub fn training_runs(&self) -> &dyn TrainingMetadataRepository {
        self.training_runs.as_ref()
    }

    pub fn publisher(&self) -> &dyn EventPublisher {
        self.publisher.as_ref()
    }

    /// The LLM client, if suggestions are enabled and one is configured.
    pub fn llm(&self) -> Option<&dyn SuggestionClient> {
        if !self.settings.llm_available() {
            return None;
        }
        self.llm.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
