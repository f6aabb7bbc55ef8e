//! The persisted artifact: fitted vectorizer, classifier and label set.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::logistic::LogisticRegression;
use super::tfidf::TfidfVectorizer;
use super::TrainingError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub vectorizer: TfidfVectorizer,
    pub classifier: LogisticRegression,
    /// Diagnosis labels indexed by classifier class.
    pub labels: Vec<String>,
}

impl ModelBundle {
    /// Most likely diagnosis for a symptom text.
    pub fn predict(&self, symptom_text: &str) -> Option<&str> {
        let row = self.vectorizer.transform(symptom_text);
        self.labels
            .get(self.classifier.predict(&row))
            .map(String::as_str)
    }

    /// Write the bundle to `path`, creating parent directories and
    /// replacing any previous artifact.
    ///
    /// The bytes go to a uniquely named sibling file first and are renamed
    /// over `path`, so readers and concurrent saves only ever see a complete
    /// artifact.
    pub fn save(&self, path: &Path) -> Result<(), TrainingError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = bitcode::serialize(self)?;

        let mut staging = path.as_os_str().to_owned();
        staging.push(format!(".{}.tmp", Uuid::new_v4()));
        let staging = PathBuf::from(staging);

        if let Err(e) = fs::write(&staging, bytes).and_then(|()| fs::rename(&staging, path)) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, TrainingError> {
        let bytes = fs::read(path)?;
        Ok(bitcode::deserialize(&bytes)?)
    }
}
