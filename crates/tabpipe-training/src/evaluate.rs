//! Scoring a live endpoint against the held-out test partition.

use crate::config::{DatasetConfig, EvaluationConfig};
use crate::dataset;
use crate::error::{PipelineError, PipelineResult};
use crate::layout::LocalLayout;
use crate::metrics::EvaluationReport;
use crate::progress::{NullProgressSink, ProgressEvent, ProgressSink, Stage};
use serde::Deserialize;
use std::sync::Arc;
use tabpipe_platform::{EndpointService, EndpointSummary};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct InvocationResponse {
    probabilities: Vec<Vec<f64>>,
}

/// Pick the endpoint to evaluate.
///
/// An explicit name must appear in the listing. Otherwise the newest endpoint
/// by `created_at` wins; without any timestamps, the first listed.
pub fn select_endpoint<'a>(
    endpoints: &'a [EndpointSummary],
    explicit: Option<&str>,
) -> PipelineResult<&'a EndpointSummary> {
    if let Some(name) = explicit {
        return endpoints
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| PipelineError::EndpointNotFound(name.to_string()));
    }

    // Reversed so that equal timestamps resolve to the earliest listed.
    let newest = endpoints
        .iter()
        .rev()
        .filter(|e| e.created_at.is_some())
        .max_by_key(|e| e.created_at);

    newest.or_else(|| endpoints.first()).ok_or(PipelineError::NoEndpoint)
}

/// The whole feature matrix as one comma-separated payload without header.
pub fn encode_payload(rows: &[Vec<String>]) -> PipelineResult<Vec<u8>> {
    dataset::encode_features(rows)
}

/// Decode `{"probabilities": [[...], ...]}`, expecting one row per input row.
pub fn parse_probabilities(body: &[u8], expected_rows: usize) -> PipelineResult<Vec<Vec<f64>>> {
    let response: InvocationResponse = serde_json::from_slice(body)
        .map_err(|e| PipelineError::InvalidResponse(format!("cannot decode body: {}", e)))?;

    if response.probabilities.len() != expected_rows {
        return Err(PipelineError::InvalidResponse(format!(
            "expected {} probability rows, got {}",
            expected_rows,
            response.probabilities.len()
        )));
    }
    for (i, row) in response.probabilities.iter().enumerate() {
        if row.is_empty() {
            return Err(PipelineError::InvalidResponse(format!("row {} has no probabilities", i)));
        }
        if row.iter().any(|p| !p.is_finite()) {
            return Err(PipelineError::InvalidResponse(format!("row {} has a non-finite value", i)));
        }
    }
    Ok(response.probabilities)
}

/// Index of the largest value; the first one on ties.
pub fn argmax(row: &[f64]) -> PipelineResult<u8> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &p) in row.iter().enumerate() {
        if best.is_none_or(|(_, b)| p > b) {
            best = Some((i, p));
        }
    }
    let (index, _) = best.ok_or_else(|| PipelineError::InvalidResponse("empty probability row".into()))?;
    u8::try_from(index)
        .map_err(|_| PipelineError::InvalidResponse(format!("class index {} out of range", index)))
}

pub struct Evaluator<'a> {
    endpoints: &'a dyn EndpointService,
    progress: Arc<dyn ProgressSink>,
}

impl<'a> Evaluator<'a> {
    pub fn new<E: EndpointService>(endpoints: &'a E) -> Self {
        Self { endpoints, progress: Arc::new(NullProgressSink) }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Score the selected endpoint on `<local_dir>/X_test.csv` and `y_test.csv`.
    pub async fn evaluate(
        &self,
        dataset_config: &DatasetConfig,
        config: &EvaluationConfig,
    ) -> PipelineResult<EvaluationReport> {
        self.progress.on_event(ProgressEvent::Started { stage: Stage::Evaluate });

        let listing = self.endpoints.list_endpoints().await?;
        let endpoint = select_endpoint(&listing, config.endpoint.as_deref())?.name.clone();
        info!(endpoint = %endpoint, "selected endpoint");

        let local = LocalLayout::new(&dataset_config.local_dir);
        let features = dataset::read_feature_file(&local.features_path())?;
        let labels = dataset::read_label_file(&local.labels_path())?;
        if features.len() != labels.len() {
            return Err(PipelineError::Evaluation(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if features.is_empty() {
            return Err(PipelineError::Evaluation("test partition is empty".to_string()));
        }

        let payload = encode_payload(&features)?;
        debug!(bytes = payload.len(), rows = features.len(), "invoking endpoint");
        self.progress.on_event(ProgressEvent::Message {
            stage: Stage::Evaluate,
            message: format!("Invoking {} with {} rows", endpoint, features.len()),
        });
        let body = self.endpoints.invoke_endpoint(&endpoint, &config.content_type, payload).await?;

        let probabilities = parse_probabilities(&body, features.len())?;
        let predicted = probabilities.iter().map(|row| argmax(row)).collect::<PipelineResult<Vec<_>>>()?;
        let report = EvaluationReport::compute(endpoint.clone(), &labels, &predicted)?;
        info!(endpoint = %endpoint, accuracy = report.accuracy, f1 = report.f1, "evaluation finished");

        if config.delete_endpoint {
            self.endpoints.delete_endpoint(&endpoint).await?;
            self.progress.on_event(ProgressEvent::Message {
                stage: Stage::Evaluate,
                message: format!("Deleted endpoint {}", endpoint),
            });
        }

        self.progress.on_event(ProgressEvent::Finished { stage: Stage::Evaluate });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tabpipe_platform::InMemoryPlatform;
    use tempfile::TempDir;

    fn summary(name: &str, ts: Option<i64>) -> EndpointSummary {
        EndpointSummary {
            name: name.to_string(),
            status: Some("InService".to_string()),
            created_at: ts.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
        }
    }

    fn write_test_files(dir: &TempDir, x: &str, y: &str) -> DatasetConfig {
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("X_test.csv"), x).unwrap();
        std::fs::write(local.join("y_test.csv"), y).unwrap();
        DatasetConfig { local_dir: local, ..DatasetConfig::default() }
    }

    #[test]
    fn test_select_endpoint_rules() {
        let listing = vec![summary("old", Some(100)), summary("new", Some(200)), summary("plain", None)];

        assert_eq!(select_endpoint(&listing, None).unwrap().name, "new");
        assert_eq!(select_endpoint(&listing, Some("old")).unwrap().name, "old");
        assert!(matches!(
            select_endpoint(&listing, Some("gone")),
            Err(PipelineError::EndpointNotFound(_))
        ));

        let untimed = vec![summary("a", None), summary("b", None)];
        assert_eq!(select_endpoint(&untimed, None).unwrap().name, "a");
        assert!(matches!(select_endpoint(&[], None), Err(PipelineError::NoEndpoint)));
    }

    #[test]
    fn test_argmax_ties_take_first() {
        assert_eq!(argmax(&[0.9, 0.1]).unwrap(), 0);
        assert_eq!(argmax(&[0.2, 0.8]).unwrap(), 1);
        assert_eq!(argmax(&[0.5, 0.5]).unwrap(), 0);
        assert!(argmax(&[]).is_err());
    }

    #[test]
    fn test_parse_probabilities_rejects_bad_bodies() {
        assert!(parse_probabilities(br#"{"probabilities": [[0.1, 0.9]]}"#, 1).is_ok());
        assert!(parse_probabilities(b"not json", 1).is_err());
        assert!(parse_probabilities(br#"{"predictions": [[0.1]]}"#, 1).is_err());
        assert!(parse_probabilities(br#"{"probabilities": [[0.1, 0.9]]}"#, 2).is_err());
        assert!(parse_probabilities(br#"{"probabilities": [[]]}"#, 1).is_err());
    }

    #[tokio::test]
    async fn test_evaluate_scores_toy_endpoint() {
        let temp = TempDir::new().unwrap();
        let dataset = write_test_files(&temp, "A11,6\nA14,12\n", "0\n1\n");
        let platform = InMemoryPlatform::new()
            .with_endpoints(vec![summary("tabtransformers-ep-1", Some(10))])
            .with_invocation_response(r#"{"probabilities": [[0.9, 0.1], [0.2, 0.8]]}"#);

        let report = Evaluator::new(&platform)
            .evaluate(&dataset, &EvaluationConfig::default())
            .await
            .unwrap();

        assert_eq!(report.endpoint, "tabtransformers-ep-1");
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.f1, 1.0);
        assert_eq!(report.confusion_matrix.counts, vec![vec![1, 0], vec![0, 1]]);

        let calls = platform.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].content_type, "text/csv");
        assert_eq!(calls[0].body, b"A11,6\nA14,12\n");
        assert!(platform.deleted_endpoints().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_deletes_endpoint_when_asked() {
        let temp = TempDir::new().unwrap();
        let dataset = write_test_files(&temp, "A11,6\n", "1\n");
        let platform = InMemoryPlatform::new().with_endpoints(vec![summary("ep", None)]);
        let config = EvaluationConfig { delete_endpoint: true, ..EvaluationConfig::default() };

        Evaluator::new(&platform).evaluate(&dataset, &config).await.unwrap();
        assert_eq!(platform.deleted_endpoints(), vec!["ep"]);
    }

    #[tokio::test]
    async fn test_evaluate_without_endpoints() {
        let temp = TempDir::new().unwrap();
        let dataset = write_test_files(&temp, "A11,6\n", "1\n");
        let err = Evaluator::new(&InMemoryPlatform::new())
            .evaluate(&dataset, &EvaluationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoEndpoint));
    }

    #[tokio::test]
    async fn test_evaluate_rejects_row_count_mismatch() {
        let temp = TempDir::new().unwrap();
        let dataset = write_test_files(&temp, "A11,6\nA12,7\n", "1\n");
        let platform = InMemoryPlatform::new().with_endpoints(vec![summary("ep", None)]);
        let err = Evaluator::new(&platform)
            .evaluate(&dataset, &EvaluationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Evaluation(_)));
        assert!(platform.invocations().is_empty());
    }
}
