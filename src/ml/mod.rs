//! Diagnosis classifier trained from historical prescriptions.
//!
//! Symptoms are vectorized with TF-IDF and fed to a softmax logistic
//! regression whose classes are the distinct diagnoses. Training is CPU bound
//! and meant to run on the blocking pool.

mod bundle;
mod logistic;
mod split;
mod tfidf;

use std::path::Path;

use thiserror::Error;

pub use bundle::ModelBundle;
pub use logistic::LogisticRegression;
pub use split::{test_count, test_fraction, train_test_split, SPLIT_SEED};
pub use tfidf::{tokenize, TfidfVectorizer};

/// Vocabulary cap for the vectorizer.
pub const MAX_FEATURES: usize = 500;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("no training data available")]
    EmptyDataset,

    #[error("model artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("model artifact encoding failed: {0}")]
    Encoding(#[from] bitcode::Error),

    #[error("training worker failed: {0}")]
    Worker(String),
}

/// One labelled training example.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub symptom_text: String,
    pub diagnosis: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub accuracy: f64,
    pub dataset_size: usize,
    /// Size of the held-out set; 0 when everything was used for fitting.
    pub held_out: usize,
    pub bundle: ModelBundle,
}

/// Fit a classifier on `samples` and score it.
///
/// With fewer than two distinct diagnoses there is nothing to discriminate:
/// the model is fit on every sample and reported as fully accurate.
/// Otherwise a seeded shuffle holds out `test_count(n)` samples and the
/// accuracy is measured on them.
pub fn train(samples: &[TrainingSample]) -> Result<TrainingReport, TrainingError> {
    if samples.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }

    let mut labels: Vec<String> = samples.iter().map(|s| s.diagnosis.clone()).collect();
    labels.sort();
    labels.dedup();
    let targets: Vec<usize> = samples
        .iter()
        .map(|s| labels.binary_search(&s.diagnosis).unwrap_or(0))
        .collect();

    let texts: Vec<String> = samples.iter().map(|s| s.symptom_text.clone()).collect();
    let mut vectorizer = TfidfVectorizer::new(MAX_FEATURES);
    let rows = vectorizer.fit_transform(&texts);

    if labels.len() < 2 {
        let classifier = LogisticRegression::fit(&rows, &targets, labels.len());
        return Ok(TrainingReport {
            accuracy: 1.0,
            dataset_size: samples.len(),
            held_out: 0,
            bundle: ModelBundle {
                vectorizer,
                classifier,
                labels,
            },
        });
    }

    let (train_idx, test_idx) = train_test_split(samples.len());
    let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].clone()).collect();
    let train_targets: Vec<usize> = train_idx.iter().map(|&i| targets[i]).collect();
    let classifier = LogisticRegression::fit(&train_rows, &train_targets, labels.len());

    let correct = test_idx
        .iter()
        .filter(|&&i| classifier.predict(&rows[i]) == targets[i])
        .count();
    let accuracy = if test_idx.is_empty() {
        0.0
    } else {
        correct as f64 / test_idx.len() as f64
    };

    Ok(TrainingReport {
        accuracy,
        dataset_size: samples.len(),
        held_out: test_idx.len(),
        bundle: ModelBundle {
            vectorizer,
            classifier,
            labels,
        },
    })
}

/// Train and persist the bundle at `path`.
pub fn train_and_save(
    samples: &[TrainingSample],
    path: &Path,
) -> Result<TrainingReport, TrainingError> {
    let report = train(samples)?;
    report.bundle.save(path)?;
    Ok(report)
}
