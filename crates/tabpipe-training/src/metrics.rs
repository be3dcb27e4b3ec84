//! Classification metrics for hard 0/1 predictions.
//!
//! - Accuracy
//! - Precision, recall and F1 for the positive class `1`
//! - Confusion matrix over the observed labels

use crate::error::{PipelineError, PipelineResult};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// The class treated as positive by precision, recall and F1.
pub const POSITIVE_LABEL: u8 = 1;

fn check_lengths(truth: &[u8], predicted: &[u8]) -> PipelineResult<()> {
    if truth.len() != predicted.len() {
        return Err(PipelineError::Evaluation(format!(
            "{} true labels but {} predictions",
            truth.len(),
            predicted.len()
        )));
    }
    if truth.is_empty() {
        return Err(PipelineError::Evaluation("no rows to score".to_string()));
    }
    Ok(())
}

/// Fraction of positions where prediction equals truth.
pub fn accuracy(truth: &[u8], predicted: &[u8]) -> PipelineResult<f64> {
    check_lengths(truth, predicted)?;
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / truth.len() as f64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BinaryCounts {
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
}

impl BinaryCounts {
    fn count(truth: &[u8], predicted: &[u8]) -> Self {
        let mut counts = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t == POSITIVE_LABEL, p == POSITIVE_LABEL) {
                (true, true) => counts.true_positives += 1,
                (false, true) => counts.false_positives += 1,
                (true, false) => counts.false_negatives += 1,
                (false, false) => {}
            }
        }
        counts
    }

    fn precision(self) -> f64 {
        let predicted = self.true_positives + self.false_positives;
        if predicted == 0 { 0.0 } else { self.true_positives as f64 / predicted as f64 }
    }

    fn recall(self) -> f64 {
        let actual = self.true_positives + self.false_negatives;
        if actual == 0 { 0.0 } else { self.true_positives as f64 / actual as f64 }
    }
}

pub fn precision(truth: &[u8], predicted: &[u8]) -> PipelineResult<f64> {
    check_lengths(truth, predicted)?;
    Ok(BinaryCounts::count(truth, predicted).precision())
}

pub fn recall(truth: &[u8], predicted: &[u8]) -> PipelineResult<f64> {
    check_lengths(truth, predicted)?;
    Ok(BinaryCounts::count(truth, predicted).recall())
}

/// Harmonic mean of precision and recall; 0.0 when both are 0.
pub fn f1_score(truth: &[u8], predicted: &[u8]) -> PipelineResult<f64> {
    check_lengths(truth, predicted)?;
    let counts = BinaryCounts::count(truth, predicted);
    let (p, r) = (counts.precision(), counts.recall());
    if p + r == 0.0 {
        if counts.true_positives + counts.false_negatives == 0 {
            warn!("no positive labels in ground truth; F1 is 0");
        }
        return Ok(0.0);
    }
    Ok(2.0 * p * r / (p + r))
}

/// Counts indexed `[true][predicted]` over the sorted union of observed labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<u8>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn compute(truth: &[u8], predicted: &[u8]) -> PipelineResult<Self> {
        check_lengths(truth, predicted)?;
        let labels: Vec<u8> =
            truth.iter().chain(predicted).copied().collect::<BTreeSet<_>>().into_iter().collect();
        let index = |label: u8| labels.iter().position(|&l| l == label).unwrap_or_default();

        let mut counts = vec![vec![0_usize; labels.len()]; labels.len()];
        for (&t, &p) in truth.iter().zip(predicted) {
            counts[index(t)][index(p)] += 1;
        }
        Ok(Self { labels, counts })
    }

    /// Count of rows with true label `truth` predicted as `predicted`.
    #[must_use]
    pub fn get(&self, truth: u8, predicted: u8) -> usize {
        let row = self.labels.iter().position(|&l| l == truth);
        let col = self.labels.iter().position(|&l| l == predicted);
        match (row, col) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.counts.iter().flatten().map(|c| c.to_string().len()).max().unwrap_or(1);
        write!(f, "[")?;
        for (i, row) in self.counts.iter().enumerate() {
            if i > 0 {
                write!(f, "\n ")?;
            }
            let cells: Vec<String> = row.iter().map(|c| format!("{:>width$}", c)).collect();
            write!(f, "[{}]", cells.join(" "))?;
        }
        write!(f, "]")
    }
}

/// Scores of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub endpoint: String,
    pub rows: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl EvaluationReport {
    pub fn compute(endpoint: impl Into<String>, truth: &[u8], predicted: &[u8]) -> PipelineResult<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            rows: truth.len(),
            accuracy: accuracy(truth, predicted)?,
            precision: precision(truth, predicted)?,
            recall: recall(truth, predicted)?,
            f1: f1_score(truth, predicted)?,
            confusion_matrix: ConfusionMatrix::compute(truth, predicted)?,
        })
    }
}
