//! Multinomial (softmax) logistic regression trained by batch gradient descent.

use serde::{Deserialize, Serialize};

/// Inverse regularization strength, as in the common `C = 1.0` default.
const INVERSE_REGULARIZATION: f64 = 1.0;
const LEARNING_RATE: f64 = 0.5;
const MAX_ITER: usize = 1000;
const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    n_classes: usize,
    n_features: usize,
    /// Row-major `n_classes x n_features`.
    weights: Vec<f64>,
    intercepts: Vec<f64>,
}

impl LogisticRegression {
    /// Fit on dense rows `x` with class indices `y` in `0..n_classes`.
    pub fn fit(x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut model = Self {
            n_classes,
            n_features,
            weights: vec![0.0; n_classes * n_features],
            intercepts: vec![0.0; n_classes],
        };
        if x.is_empty() || n_classes < 2 {
            return model;
        }

        let n = x.len() as f64;
        let l2 = 1.0 / (INVERSE_REGULARIZATION * n);
        let mut grad_w = vec![0.0; model.weights.len()];
        let mut grad_b = vec![0.0; n_classes];

        for _ in 0..MAX_ITER {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            grad_b.iter_mut().for_each(|g| *g = 0.0);

            for (row, &label) in x.iter().zip(y) {
                let probs = model.probabilities(row);
                for (class, p) in probs.iter().enumerate() {
                    let err = p - if class == label { 1.0 } else { 0.0 };
                    grad_b[class] += err / n;
                    let offset = class * n_features;
                    for (feature, value) in row.iter().enumerate() {
                        grad_w[offset + feature] += err * value / n;
                    }
                }
            }

            let mut step = 0.0f64;
            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                let delta = LEARNING_RATE * (g + l2 * *w);
                *w -= delta;
                step = step.max(delta.abs());
            }
            for (b, g) in model.intercepts.iter_mut().zip(&grad_b) {
                let delta = LEARNING_RATE * g;
                *b -= delta;
                step = step.max(delta.abs());
            }
            if step < TOLERANCE {
                break;
            }
        }
        model
    }

    /// Softmax class probabilities for one row.
    pub fn probabilities(&self, row: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = (0..self.n_classes)
            .map(|class| {
                let weights = &self.weights[class * self.n_features..(class + 1) * self.n_features];
                self.intercepts[class]
                    + weights.iter().zip(row).map(|(w, v)| w * v).sum::<f64>()
            })
            .collect();

        let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }

    /// Index of the most probable class; the lowest index wins ties.
    pub fn predict(&self, row: &[f64]) -> usize {
        let probs = self.probabilities(row);
        let mut best = 0;
        for (class, p) in probs.iter().enumerate() {
            if *p > probs[best] {
                best = class;
            }
        }
        best
    }
}
