//! Managed ML platform abstraction for tabpipe.
//!
//! This crate defines the traits and types the pipeline stages use to talk to
//! the external platform: object storage, the model registry, training jobs and
//! inference endpoints. Two implementations ship with it:
//! - [`HttpPlatform`]: a REST client for a platform gateway
//! - [`InMemoryPlatform`]: a scripted in-process platform for tests and dry runs

pub mod http;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpPlatform;
pub use memory::InMemoryPlatform;
pub use types::{
    ArtifactBundle, ArtifactScope, DeployRequest, EndpointSummary, Hyperparameters, JobStatus,
    ModelRef, ObjectLocation, TrainingJobDescription, TrainingJobHandle, TrainingJobRequest,
};

/// Represents an error returned by the managed platform or the transport to it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformError {
    /// The request could not be sent or the connection failed.
    #[error("Request Error: {0}")]
    Request(String),

    /// The referenced resource (model, job, endpoint, bucket) does not exist.
    #[error("Not Found: {0}")]
    NotFound(String),

    /// The platform rejected the combination of parameters (e.g. instance type).
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Credentials were missing or rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success response.
    #[error("API Error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// A response body could not be decoded.
    #[error("Serialization Error: {0}")]
    Serialization(String),

    /// Other unexpected errors.
    #[error("Other Platform Error: {0}")]
    Other(String),
}

/// Result alias for platform calls.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Remote object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// The bucket the platform assigns to this account when none is configured.
    async fn default_bucket(&self) -> PlatformResult<String>;

    /// Store `body` at `location`, replacing any existing object.
    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Vec<u8>,
        content_type: &str,
    ) -> PlatformResult<()>;
}

/// Registry of pretrained models and the artifacts needed to fine-tune or serve them.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Resolve the container image, script bundle and (for training) base model
    /// for `model` on `instance_type`.
    async fn resolve_artifacts(
        &self,
        model: &ModelRef,
        scope: ArtifactScope,
        instance_type: &str,
    ) -> PlatformResult<ArtifactBundle>;

    /// The hyperparameters the registry publishes as defaults for `model`.
    async fn default_hyperparameters(&self, model: &ModelRef) -> PlatformResult<Hyperparameters>;
}

/// Asynchronous training jobs.
#[async_trait]
pub trait TrainingService: Send + Sync {
    /// Resolve an execution role name to the identifier jobs run under.
    async fn execution_role_arn(&self, role_name: &str) -> PlatformResult<String>;

    /// Submit a job. Returns as soon as the platform accepted it.
    async fn create_training_job(
        &self,
        request: &TrainingJobRequest,
    ) -> PlatformResult<TrainingJobHandle>;

    /// Current state of a previously submitted job.
    async fn describe_training_job(&self, job_name: &str)
    -> PlatformResult<TrainingJobDescription>;
}

/// Live inference endpoints.
#[async_trait]
pub trait EndpointService: Send + Sync {
    /// Provision an endpoint and return its name.
    async fn deploy(&self, request: &DeployRequest) -> PlatformResult<String>;

    /// All endpoints in platform order.
    async fn list_endpoints(&self) -> PlatformResult<Vec<EndpointSummary>>;

    async fn delete_endpoint(&self, endpoint_name: &str) -> PlatformResult<()>;

    /// Synchronous inference call returning the raw response body.
    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> PlatformResult<Vec<u8>>;
}

/// Convenience bound for a handle that serves every platform concern.
pub trait Platform: ObjectStore + ModelRegistry + TrainingService + EndpointService {}

impl<T> Platform for T where T: ObjectStore + ModelRegistry + TrainingService + EndpointService {}
