use std::time::Duration;

use tabpipe_platform::{ArtifactScope, ModelRef, PlatformError};
use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("line {line}: expected {expected} fields, found {found}")]
    MalformedRow { line: usize, expected: usize, found: usize },

    #[error("line {line}: unrecognised target value {value:?} (expected 1 or 2)")]
    UnknownLabel { line: usize, value: String },

    #[error("failed to fetch dataset from {location}: {reason}")]
    Fetch { location: String, reason: String },

    #[error("could not resolve {scope} artifacts for {model}: {source}")]
    Resolution {
        model: ModelRef,
        scope: ArtifactScope,
        #[source]
        source: PlatformError,
    },

    #[error("training job {job_name} was not terminal after waiting {waited:?}; it is still running on the platform")]
    WaitTimeout { job_name: String, waited: Duration },

    #[error("training job {job_name} was not terminal after {attempts} status checks; it is still running on the platform")]
    AttemptsExhausted { job_name: String, attempts: u32 },

    #[error("stopped waiting for training job {job_name}; it is still running on the platform")]
    Cancelled { job_name: String },

    #[error("training job {job_name} ended with unexpected status {status}")]
    UnexpectedStatus { job_name: String, status: String },

    #[error("no live endpoints to evaluate")]
    NoEndpoint,

    #[error("endpoint {0} is not listed by the platform")]
    EndpointNotFound(String),

    #[error("invalid endpoint response: {0}")]
    InvalidResponse(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
