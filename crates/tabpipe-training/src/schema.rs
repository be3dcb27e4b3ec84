//! Column semantics for the raw dataset.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name of the label column.
pub const TARGET_COLUMN: &str = "Target";

/// Categorical columns of the Statlog German credit data.
pub const GERMAN_CREDIT_CATEGORICAL: [usize; 14] = [1, 3, 4, 5, 6, 7, 9, 10, 12, 14, 15, 17, 19, 20];

/// Feature count and categorical columns of a raw dataset.
///
/// Categorical positions address columns of the label-first training file:
/// column 0 is the label, so valid positions are `1..=feature_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabularSchema {
    feature_count: usize,
    categorical: Vec<usize>,
}

impl TabularSchema {
    pub fn new(feature_count: usize, categorical: Vec<usize>) -> PipelineResult<Self> {
        let schema = Self { feature_count, categorical };
        schema.validate()?;
        Ok(schema)
    }

    /// The schema of the Statlog German credit dataset: 20 features, 14 categorical.
    #[must_use]
    pub fn german_credit() -> Self {
        Self { feature_count: 20, categorical: GERMAN_CREDIT_CATEGORICAL.to_vec() }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.feature_count == 0 {
            return Err(PipelineError::InvalidSchema("feature_count must be >= 1".to_string()));
        }
        let mut seen = BTreeSet::new();
        for &position in &self.categorical {
            if position == 0 || position > self.feature_count {
                return Err(PipelineError::InvalidSchema(format!(
                    "categorical position {} is outside 1..={}",
                    position, self.feature_count
                )));
            }
            if !seen.insert(position) {
                return Err(PipelineError::InvalidSchema(format!(
                    "categorical position {} is listed twice",
                    position
                )));
            }
        }
        Ok(())
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Fields per raw row: every feature plus the label.
    pub fn column_count(&self) -> usize {
        self.feature_count + 1
    }

    pub fn categorical(&self) -> &[usize] {
        &self.categorical
    }

    /// `Feature_1..Feature_k` followed by `Target`.
    pub fn column_names(&self) -> Vec<String> {
        (1..=self.feature_count)
            .map(|i| format!("Feature_{i}"))
            .chain(std::iter::once(TARGET_COLUMN.to_string()))
            .collect()
    }

    pub fn descriptor(&self) -> CategoricalIndex {
        CategoricalIndex { cat_index: self.categorical.clone() }
    }
}

impl Default for TabularSchema {
    fn default() -> Self {
        Self::german_credit()
    }
}

/// The `cat_index.json` sidecar uploaded next to the training data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalIndex {
    pub cat_index: Vec<usize>,
}

impl CategoricalIndex {
    pub fn to_json_bytes(&self) -> PipelineResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_german_credit_descriptor() {
        let schema = TabularSchema::german_credit();
        schema.validate().unwrap();
        assert_eq!(schema.column_count(), 21);

        let json = schema.descriptor().to_json_bytes().unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            r#"{"cat_index":[1,3,4,5,6,7,9,10,12,14,15,17,19,20]}"#
        );
    }

    #[test]
    fn test_column_names() {
        let schema = TabularSchema::new(3, vec![2]).unwrap();
        assert_eq!(schema.column_names(), vec!["Feature_1", "Feature_2", "Feature_3", "Target"]);
    }

    #[test]
    fn test_rejects_out_of_range_and_duplicates() {
        assert!(TabularSchema::new(0, vec![]).is_err());
        assert!(TabularSchema::new(5, vec![0]).is_err());
        assert!(TabularSchema::new(5, vec![6]).is_err());
        assert!(TabularSchema::new(5, vec![2, 2]).is_err());
        assert!(TabularSchema::new(5, vec![5, 1]).is_ok());
    }
}
