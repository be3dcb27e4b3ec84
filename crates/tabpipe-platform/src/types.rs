//! Value types exchanged with the platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hyperparameters as the platform publishes them: string keys and string values.
pub type Hyperparameters = BTreeMap<String, String>;

/// A registry model identifier plus version selector (`"*"` selects the latest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub model_id: String,
    pub version: String,
}

impl ModelRef {
    pub fn new(model_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self { model_id: model_id.into(), version: version.into() }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.model_id, self.version)
    }
}

/// Which half of the model lifecycle an artifact lookup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactScope {
    Training,
    Inference,
}

impl ArtifactScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactScope::Training => "training",
            ArtifactScope::Inference => "inference",
        }
    }
}

impl fmt::Display for ArtifactScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifacts resolved from the registry for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    /// Container image reference.
    pub image_uri: String,
    /// Script bundle reference.
    pub script_uri: String,
    /// Pretrained base-model artifact. Only published for the training scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_uri: Option<String>,
}

/// A bucket plus key in remote object storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Everything the platform needs to launch one training job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJobRequest {
    pub job_name: String,
    pub role_arn: String,
    pub image_uri: String,
    pub script_uri: String,
    pub model_uri: String,
    pub entry_point: String,
    pub instance_count: u32,
    pub instance_type: String,
    pub max_runtime_secs: u64,
    pub hyperparameters: Hyperparameters,
    /// Channel name to remote input prefix (e.g. `training` -> `bucket/folder/`).
    pub input_channels: BTreeMap<String, String>,
    pub output_path: String,
}

/// Returned by job submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJobHandle {
    pub job_name: String,
}

/// Training job status as reported by the platform.
///
/// Only `Completed` and `Failed` are terminal. Unrecognised values are kept
/// verbatim in `Other` and treated as still running.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
    Stopping,
    Stopped,
    Other(String),
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::InProgress => "InProgress",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
            JobStatus::Stopping => "Stopping",
            JobStatus::Stopped => "Stopped",
            JobStatus::Other(raw) => raw,
        }
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        match value {
            "InProgress" => JobStatus::InProgress,
            "Completed" => JobStatus::Completed,
            "Failed" => JobStatus::Failed,
            "Stopping" => JobStatus::Stopping,
            "Stopped" => JobStatus::Stopped,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        JobStatus::from(value.as_str())
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a training job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingJobDescription {
    pub job_name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Location of the trained model artifact once the job completed.
    #[serde(default)]
    pub model_artifact: Option<String>,
}

/// Everything the platform needs to provision one endpoint from a trained job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    pub endpoint_name: String,
    pub training_job_name: String,
    #[serde(default)]
    pub model_artifact: Option<String>,
    pub image_uri: String,
    pub script_uri: String,
    pub entry_point: String,
    pub instance_count: u32,
    pub instance_type: String,
}

/// One entry of the endpoint listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal_values() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(!JobStatus::Stopped.is_terminal());
        assert!(!JobStatus::from("Provisioning").is_terminal());
    }

    #[test]
    fn test_job_status_keeps_unknown_values() {
        let status: JobStatus = serde_json::from_str("\"Provisioning\"").unwrap();
        assert_eq!(status, JobStatus::Other("Provisioning".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"Provisioning\"");
    }

    #[test]
    fn test_description_defaults_optional_fields() {
        let desc: TrainingJobDescription =
            serde_json::from_str(r#"{"job_name": "j", "status": "InProgress"}"#).unwrap();
        assert_eq!(desc.status, JobStatus::InProgress);
        assert!(desc.failure_reason.is_none());
        assert!(desc.model_artifact.is_none());
    }

    #[test]
    fn test_object_location_display() {
        let loc = ObjectLocation::new("bucket", "tab-transformer/train/data.csv");
        assert_eq!(loc.to_string(), "bucket/tab-transformer/train/data.csv");
    }
}
