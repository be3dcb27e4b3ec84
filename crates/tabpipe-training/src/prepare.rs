//! Dataset preparation: fetch, parse, remap, split, write the test partition
//! locally and upload the training inputs.

use crate::config::{DatasetConfig, StorageConfig};
use crate::dataset::{self, TabularRecord};
use crate::error::PipelineResult;
use crate::layout::{LocalLayout, StorageLayout};
use crate::progress::{NullProgressSink, ProgressEvent, ProgressSink, Stage};
use crate::source::{DefaultSourceFetcher, SourceFetcher};
use crate::split::split_dataset;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tabpipe_platform::{ObjectLocation, ObjectStore};
use tracing::info;

const CSV_CONTENT_TYPE: &str = "text/csv";
const JSON_CONTENT_TYPE: &str = "application/json";

/// What a preparation run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparationReport {
    pub source: String,
    /// SHA-256 over the parsed, remapped rows.
    pub content_hash: String,
    pub total_rows: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub test_rows: usize,
    pub train_location: ObjectLocation,
    pub validation_location: ObjectLocation,
    pub categorical_index_location: ObjectLocation,
    pub features_path: PathBuf,
    pub labels_path: PathBuf,
}

struct Rendered {
    train: Vec<u8>,
    validation: Vec<u8>,
    descriptor: Vec<u8>,
    features: Vec<u8>,
    labels: Vec<u8>,
}

pub struct Preparer<'a> {
    store: &'a dyn ObjectStore,
    fetcher: Box<dyn SourceFetcher + 'a>,
    progress: Arc<dyn ProgressSink>,
}

impl<'a> Preparer<'a> {
    pub fn new<S: ObjectStore>(store: &'a S) -> Self {
        Self {
            store,
            fetcher: Box::new(DefaultSourceFetcher::new()),
            progress: Arc::new(NullProgressSink),
        }
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: impl SourceFetcher + 'a) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the whole preparation stage.
    ///
    /// Everything is parsed, split and rendered before the first write, so a bad
    /// row or an impossible split leaves local and remote storage untouched.
    pub async fn prepare(
        &self,
        dataset_config: &DatasetConfig,
        storage: &StorageConfig,
    ) -> PipelineResult<PreparationReport> {
        self.progress.on_event(ProgressEvent::Started { stage: Stage::Prepare });

        let schema = dataset_config.schema()?;
        let fractions = dataset_config.fractions();
        fractions.validate()?;

        let source = &dataset_config.source_url;
        self.message(format!("Fetching dataset from {}", source));
        let text = self.fetcher.fetch(source).await?;
        let parsed = dataset::parse_raw(&text, &schema)?;
        let content_hash = parsed.content_hash();
        info!(rows = parsed.len(), hash = %content_hash, "parsed dataset");

        let split = split_dataset(&parsed, &fractions, dataset_config.seed)?;
        let rendered = Rendered {
            train: dataset::encode_labelled(&split.train)?,
            validation: dataset::encode_labelled(&split.validation)?,
            descriptor: schema.descriptor().to_json_bytes()?,
            features: dataset::encode_features(&feature_rows(&split.test))?,
            labels: dataset::encode_labels(&split.test)?,
        };

        let bucket = match &storage.bucket {
            Some(bucket) => bucket.clone(),
            None => self.store.default_bucket().await?,
        };
        let remote = StorageLayout::new(bucket, &storage.folder);
        let local = LocalLayout::new(&dataset_config.local_dir);

        local.ensure_dirs()?;
        tokio::fs::write(local.features_path(), &rendered.features).await?;
        tokio::fs::write(local.labels_path(), &rendered.labels).await?;
        self.message(format!("Wrote {} test rows to {}", split.test.len(), local.root().display()));

        let uploads = [
            (remote.train_location(), rendered.train, CSV_CONTENT_TYPE),
            (remote.validation_location(), rendered.validation, CSV_CONTENT_TYPE),
            (remote.categorical_index_location(), rendered.descriptor, JSON_CONTENT_TYPE),
        ];
        for (location, body, content_type) in uploads {
            info!(%location, bytes = body.len(), "uploading");
            self.store.put_object(&location, body, content_type).await?;
        }
        self.message(format!("Uploaded training inputs to {}", remote.training_prefix()));

        let report = PreparationReport {
            source: source.clone(),
            content_hash,
            total_rows: split.total(),
            train_rows: split.train.len(),
            validation_rows: split.validation.len(),
            test_rows: split.test.len(),
            train_location: remote.train_location(),
            validation_location: remote.validation_location(),
            categorical_index_location: remote.categorical_index_location(),
            features_path: local.features_path(),
            labels_path: local.labels_path(),
        };
        self.progress.on_event(ProgressEvent::Finished { stage: Stage::Prepare });
        Ok(report)
    }

    fn message(&self, message: String) {
        self.progress.on_event(ProgressEvent::Message { stage: Stage::Prepare, message });
    }
}

fn feature_rows(records: &[TabularRecord]) -> Vec<Vec<&str>> {
    records.iter().map(|r| r.features.iter().map(String::as_str).collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use tabpipe_platform::InMemoryPlatform;
    use tempfile::TempDir;

    struct StaticSource(String);

    #[async_trait]
    impl SourceFetcher for StaticSource {
        async fn fetch(&self, _location: &str) -> PipelineResult<String> {
            Ok(self.0.clone())
        }
    }

    fn raw_rows(n: usize) -> String {
        (0..n).map(|i| format!("A1{} {} A3{} {}\n", i % 4, 6 + i, i % 5, 1 + i % 2)).collect()
    }

    fn dataset_config(temp: &TempDir) -> DatasetConfig {
        DatasetConfig {
            source_url: "memory://german.data".to_string(),
            local_dir: temp.path().join("data"),
            feature_count: 3,
            categorical: vec![1, 3],
            ..DatasetConfig::default()
        }
    }

    #[tokio::test]
    async fn test_prepare_writes_and_uploads() {
        let temp = TempDir::new().unwrap();
        let platform = InMemoryPlatform::new();
        let preparer = Preparer::new(&platform).with_fetcher(StaticSource(raw_rows(50)));

        let report = preparer
            .prepare(&dataset_config(&temp), &StorageConfig::default())
            .await
            .unwrap();

        assert_eq!((report.train_rows, report.validation_rows, report.test_rows), (40, 5, 5));
        assert_eq!(report.train_location.bucket, "in-memory-default-bucket");
        assert_eq!(
            platform.object_keys(),
            vec![
                "in-memory-default-bucket/tab-transformer/cat_index.json",
                "in-memory-default-bucket/tab-transformer/train/data.csv",
                "in-memory-default-bucket/tab-transformer/validation/data.csv",
            ]
        );

        let descriptor = platform.object(&report.categorical_index_location).unwrap();
        assert_eq!(descriptor.body, br#"{"cat_index":[1,3]}"#);
        assert_eq!(descriptor.content_type, "application/json");

        let train = platform.object(&report.train_location).unwrap();
        let text = String::from_utf8(train.body).unwrap();
        assert_eq!(text.lines().count(), 40);
        assert!(text.lines().all(|l| l.starts_with("0,") || l.starts_with("1,")));

        let x = std::fs::read_to_string(&report.features_path).unwrap();
        let y = std::fs::read_to_string(&report.labels_path).unwrap();
        assert_eq!(x.lines().count(), 5);
        assert_eq!(y.lines().count(), 5);
        assert!(x.lines().all(|l| l.split(',').count() == 3));
    }

    #[tokio::test]
    async fn test_prepare_uses_configured_bucket() {
        let temp = TempDir::new().unwrap();
        let platform = InMemoryPlatform::new();
        let storage = StorageConfig { bucket: Some("team-bucket".to_string()), folder: "exp".to_string() };

        let report = Preparer::new(&platform)
            .with_fetcher(StaticSource(raw_rows(20)))
            .prepare(&dataset_config(&temp), &storage)
            .await
            .unwrap();
        assert_eq!(report.validation_location.to_string(), "team-bucket/exp/validation/data.csv");
    }

    #[tokio::test]
    async fn test_malformed_source_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let platform = InMemoryPlatform::new();
        let mut text = raw_rows(30);
        text.push_str("A11 6 A34 1 extra\n");

        let config = dataset_config(&temp);
        let err = Preparer::new(&platform)
            .with_fetcher(StaticSource(text))
            .prepare(&config, &StorageConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedRow { line: 31, expected: 4, found: 5 }));
        assert!(platform.object_keys().is_empty());
        assert!(!config.local_dir.exists());
    }

    #[tokio::test]
    async fn test_unknown_label_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let platform = InMemoryPlatform::new();
        let text = format!("{}A11 6 A34 3\n", raw_rows(10));

        let err = Preparer::new(&platform)
            .with_fetcher(StaticSource(text))
            .prepare(&dataset_config(&temp), &StorageConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownLabel { line: 11, .. }));
        assert!(platform.object_keys().is_empty());
    }
}
