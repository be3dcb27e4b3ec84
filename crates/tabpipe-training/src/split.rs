//! Seeded three-way train/validation/test split.

use crate::dataset::{TabularDataset, TabularRecord};
use crate::error::{PipelineError, PipelineResult};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

const FRACTION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Validation,
    Test,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => write!(f, "train"),
            Self::Validation => write!(f, "validation"),
            Self::Test => write!(f, "test"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitFractions {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl Default for SplitFractions {
    fn default() -> Self {
        Self { train: 0.8, validation: 0.1, test: 0.1 }
    }
}

impl SplitFractions {
    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in
            [("train", self.train), ("validation", self.validation), ("test", self.test)]
        {
            if !value.is_finite() || value <= 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{} fraction must be positive, got {}",
                    name, value
                )));
            }
        }
        let sum = self.train + self.validation + self.test;
        if (sum - 1.0).abs() > FRACTION_EPSILON {
            return Err(PipelineError::InvalidConfig(format!(
                "split fractions must sum to 1, got {}",
                sum
            )));
        }
        Ok(())
    }

    /// Row counts `(train, validation, test)` for `n` rows.
    ///
    /// Train takes `floor(train * n)`; test takes `ceil` of its share of the rest.
    #[must_use]
    pub fn sizes(&self, n: usize) -> (usize, usize, usize) {
        let total = n as f64;
        let n_train = ((self.train * total + FRACTION_EPSILON).floor() as usize).min(n);
        let rest = n - n_train;
        let test_share = self.test / (self.validation + self.test);
        let n_test = ((rest as f64 * test_share - FRACTION_EPSILON).ceil().max(0.0) as usize).min(rest);
        (n_train, rest - n_test, n_test)
    }
}

/// Three disjoint partitions of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train: Vec<TabularRecord>,
    pub validation: Vec<TabularRecord>,
    pub test: Vec<TabularRecord>,
}

impl DatasetSplit {
    pub fn partition(&self, partition: Partition) -> &[TabularRecord] {
        match partition {
            Partition::Train => &self.train,
            Partition::Validation => &self.validation,
            Partition::Test => &self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Shuffle with a seeded RNG and cut in order train, validation, test.
///
/// Identical input and seed always yield identical partitions.
pub fn split_dataset(
    dataset: &TabularDataset,
    fractions: &SplitFractions,
    seed: u64,
) -> PipelineResult<DatasetSplit> {
    fractions.validate()?;

    let (n_train, n_valid, n_test) = fractions.sizes(dataset.len());
    for (partition, size) in
        [(Partition::Train, n_train), (Partition::Validation, n_valid), (Partition::Test, n_test)]
    {
        if size == 0 {
            return Err(PipelineError::Dataset(format!(
                "{} rows are too few for the configured split: {} partition would be empty",
                dataset.len(),
                partition
            )));
        }
    }

    let mut order: Vec<usize> = (0..dataset.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut rows = order.into_iter().map(|i| dataset.records[i].clone());
    let train: Vec<_> = rows.by_ref().take(n_train).collect();
    let validation: Vec<_> = rows.by_ref().take(n_valid).collect();
    let test: Vec<_> = rows.collect();

    Ok(DatasetSplit { train, validation, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TabularSchema;
    use std::collections::HashSet;

    fn dataset(n: usize) -> TabularDataset {
        let schema = TabularSchema::new(2, vec![1]).unwrap();
        let text: String =
            (0..n).map(|i| format!("A{} {} {}\n", i, i * 10, if i % 3 == 0 { 2 } else { 1 })).collect();
        crate::dataset::parse_raw(&text, &schema).unwrap()
    }

    #[test]
    fn test_sizes_default_fractions() {
        let f = SplitFractions::default();
        assert_eq!(f.sizes(1000), (800, 100, 100));
        assert_eq!(f.sizes(10), (8, 1, 1));
        // rest = 3 after floor(8.8); test gets ceil(1.5)
        assert_eq!(f.sizes(11), (8, 1, 2));
        assert_eq!(f.sizes(13), (10, 1, 2));
    }

    #[test]
    fn test_validate_rejects_bad_fractions() {
        assert!(SplitFractions { train: 0.8, validation: 0.1, test: 0.2 }.validate().is_err());
        assert!(SplitFractions { train: 0.9, validation: 0.0, test: 0.1 }.validate().is_err());
        assert!(SplitFractions { train: f64::NAN, validation: 0.1, test: 0.1 }.validate().is_err());
        assert!(SplitFractions { train: 0.7, validation: 0.15, test: 0.15 }.validate().is_ok());
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let ds = dataset(1000);
        let split = split_dataset(&ds, &SplitFractions::default(), 42).unwrap();

        assert_eq!(split.train.len(), 800);
        assert_eq!(split.validation.len(), 100);
        assert_eq!(split.test.len(), 100);
        assert_eq!(split.total(), ds.len());

        let ids: HashSet<&str> = [&split.train, &split.validation, &split.test]
            .into_iter()
            .flatten()
            .map(|r| r.features[0].as_str())
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_split_is_deterministic_per_seed() {
        let ds = dataset(200);
        let a = split_dataset(&ds, &SplitFractions::default(), 42).unwrap();
        let b = split_dataset(&ds, &SplitFractions::default(), 42).unwrap();
        let c = split_dataset(&ds, &SplitFractions::default(), 7).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn test_split_rejects_empty_partition() {
        let ds = dataset(4);
        let err = split_dataset(&ds, &SplitFractions::default(), 42).unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(_)));
    }
}
