//! In-process platform used by tests and `--dry-run`.
//!
//! Every call is recorded so callers can assert on what a stage did. Job
//! statuses are scripted: each `describe_training_job` pops the next status and
//! the last one repeats once the script runs out.

use crate::types::{
    ArtifactBundle, ArtifactScope, DeployRequest, EndpointSummary, Hyperparameters, JobStatus,
    ModelRef, ObjectLocation, TrainingJobDescription, TrainingJobHandle, TrainingJobRequest,
};
use crate::{EndpointService, ModelRegistry, ObjectStore, PlatformError, PlatformResult, TrainingService};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// A recorded endpoint invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub endpoint_name: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    known_models: Option<Vec<ModelRef>>,
    instance_types: Option<Vec<String>>,
    hyperparameters: Hyperparameters,
    statuses: VecDeque<JobStatus>,
    last_status: Option<JobStatus>,
    failure_reason: Option<String>,
    jobs: Vec<TrainingJobRequest>,
    describe_calls: usize,
    deploys: Vec<DeployRequest>,
    endpoints: Vec<EndpointSummary>,
    deleted: Vec<String>,
    invocations: Vec<Invocation>,
    invocation_response: Option<Vec<u8>>,
}

/// Scripted implementation of all platform traits.
#[derive(Debug)]
pub struct InMemoryPlatform {
    bucket: String,
    state: Mutex<State>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    /// A permissive platform: any model and instance type resolve, jobs complete
    /// on the first poll.
    #[must_use]
    pub fn new() -> Self {
        let mut hyperparameters = Hyperparameters::new();
        hyperparameters.insert("epoch".to_string(), "10".to_string());
        hyperparameters.insert("learning_rate".to_string(), "0.001".to_string());
        hyperparameters.insert("batch_size".to_string(), "256".to_string());

        Self {
            bucket: "in-memory-default-bucket".to_string(),
            state: Mutex::new(State { hyperparameters, ..State::default() }),
        }
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Restrict the registry to `model`. May be called repeatedly.
    #[must_use]
    pub fn with_known_model(self, model: ModelRef) -> Self {
        self.state().known_models.get_or_insert_with(Vec::new).push(model);
        self
    }

    /// Restrict the registry to the given instance types.
    #[must_use]
    pub fn with_instance_types<I, S>(self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().instance_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_hyperparameters(self, hyperparameters: Hyperparameters) -> Self {
        self.state().hyperparameters = hyperparameters;
        self
    }

    /// Script the statuses returned by successive `describe_training_job` calls.
    #[must_use]
    pub fn with_job_statuses<I>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        self.state().statuses = statuses.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_failure_reason(self, reason: impl Into<String>) -> Self {
        self.state().failure_reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_endpoints(self, endpoints: Vec<EndpointSummary>) -> Self {
        self.state().endpoints = endpoints;
        self
    }

    /// Fixed body returned by every invocation.
    ///
    /// Without one, invocations answer with uniform probabilities for each
    /// non-empty line of the request.
    #[must_use]
    pub fn with_invocation_response(self, body: impl Into<Vec<u8>>) -> Self {
        self.state().invocation_response = Some(body.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn object(&self, location: &ObjectLocation) -> Option<StoredObject> {
        self.state().objects.get(&location.to_string()).cloned()
    }

    /// Keys (`bucket/key`) of all stored objects, sorted.
    pub fn object_keys(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    pub fn submitted_jobs(&self) -> Vec<TrainingJobRequest> {
        self.state().jobs.clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.state().describe_calls
    }

    pub fn deploys(&self) -> Vec<DeployRequest> {
        self.state().deploys.clone()
    }

    pub fn deleted_endpoints(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state().invocations.clone()
    }
}

fn uniform_probabilities(body: &[u8]) -> Vec<u8> {
    let rows = String::from_utf8_lossy(body).lines().filter(|l| !l.trim().is_empty()).count();
    let probabilities = vec![vec![0.5_f64, 0.5_f64]; rows];
    serde_json::json!({ "probabilities": probabilities }).to_string().into_bytes()
}

#[async_trait]
impl ObjectStore for InMemoryPlatform {
    async fn default_bucket(&self) -> PlatformResult<String> {
        Ok(self.bucket.clone())
    }

    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Vec<u8>,
        content_type: &str,
    ) -> PlatformResult<()> {
        self.state()
            .objects
            .insert(location.to_string(), StoredObject { body, content_type: content_type.to_string() });
        Ok(())
    }
}

#[async_trait]
impl ModelRegistry for InMemoryPlatform {
    async fn resolve_artifacts(
        &self,
        model: &ModelRef,
        scope: ArtifactScope,
        instance_type: &str,
    ) -> PlatformResult<ArtifactBundle> {
        let state = self.state();
        if let Some(known) = &state.known_models {
            if !known.contains(model) {
                return Err(PlatformError::NotFound(format!("model {} is not in the registry", model)));
            }
        }
        if let Some(types) = &state.instance_types {
            if !types.iter().any(|t| t == instance_type) {
                return Err(PlatformError::Unsupported(format!(
                    "instance type {} is not supported for {}",
                    instance_type, model
                )));
            }
        }

        let prefix = format!("memory://registry/{}/{}", model.model_id, model.version);
        Ok(ArtifactBundle {
            image_uri: format!("{}/{}/image:{}", prefix, scope, instance_type),
            script_uri: format!("{}/{}/sourcedir.tar.gz", prefix, scope),
            model_uri: match scope {
                ArtifactScope::Training => Some(format!("{}/model.tar.gz", prefix)),
                ArtifactScope::Inference => None,
            },
        })
    }

    async fn default_hyperparameters(&self, model: &ModelRef) -> PlatformResult<Hyperparameters> {
        let state = self.state();
        if let Some(known) = &state.known_models {
            if !known.contains(model) {
                return Err(PlatformError::NotFound(format!("model {} is not in the registry", model)));
            }
        }
        Ok(state.hyperparameters.clone())
    }
}

#[async_trait]
impl TrainingService for InMemoryPlatform {
    async fn execution_role_arn(&self, role_name: &str) -> PlatformResult<String> {
        if role_name.trim().is_empty() {
            return Err(PlatformError::NotFound("role name is empty".to_string()));
        }
        Ok(format!("memory:iam::role/{}", role_name))
    }

    async fn create_training_job(
        &self,
        request: &TrainingJobRequest,
    ) -> PlatformResult<TrainingJobHandle> {
        self.state().jobs.push(request.clone());
        Ok(TrainingJobHandle { job_name: request.job_name.clone() })
    }

    async fn describe_training_job(
        &self,
        job_name: &str,
    ) -> PlatformResult<TrainingJobDescription> {
        let mut state = self.state();
        if !state.jobs.iter().any(|j| j.job_name == job_name) {
            return Err(PlatformError::NotFound(format!("training job {}", job_name)));
        }
        state.describe_calls += 1;

        let status = match state.statuses.pop_front() {
            Some(status) => status,
            None => state.last_status.clone().unwrap_or(JobStatus::Completed),
        };
        state.last_status = Some(status.clone());

        Ok(TrainingJobDescription {
            job_name: job_name.to_string(),
            failure_reason: match status {
                JobStatus::Failed => state.failure_reason.clone(),
                _ => None,
            },
            model_artifact: match status {
                JobStatus::Completed => Some(format!("memory://jobs/{}/output/model.tar.gz", job_name)),
                _ => None,
            },
            status,
        })
    }
}

#[async_trait]
impl EndpointService for InMemoryPlatform {
    async fn deploy(&self, request: &DeployRequest) -> PlatformResult<String> {
        let mut state = self.state();
        state.deploys.push(request.clone());
        // Newest first, the way listings usually come back.
        state.endpoints.insert(
            0,
            EndpointSummary {
                name: request.endpoint_name.clone(),
                status: Some("InService".to_string()),
                created_at: Some(Utc::now()),
            },
        );
        Ok(request.endpoint_name.clone())
    }

    async fn list_endpoints(&self) -> PlatformResult<Vec<EndpointSummary>> {
        Ok(self.state().endpoints.clone())
    }

    async fn delete_endpoint(&self, endpoint_name: &str) -> PlatformResult<()> {
        let mut state = self.state();
        let before = state.endpoints.len();
        state.endpoints.retain(|e| e.name != endpoint_name);
        if state.endpoints.len() == before {
            return Err(PlatformError::NotFound(format!("endpoint {}", endpoint_name)));
        }
        state.deleted.push(endpoint_name.to_string());
        Ok(())
    }

    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> PlatformResult<Vec<u8>> {
        let mut state = self.state();
        if !state.endpoints.iter().any(|e| e.name == endpoint_name) {
            return Err(PlatformError::NotFound(format!("endpoint {}", endpoint_name)));
        }
        let response = match &state.invocation_response {
            Some(fixed) => fixed.clone(),
            None => uniform_probabilities(&body),
        };
        state.invocations.push(Invocation {
            endpoint_name: endpoint_name.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str) -> TrainingJobRequest {
        TrainingJobRequest {
            job_name: name.to_string(),
            role_arn: "role".to_string(),
            image_uri: "img".to_string(),
            script_uri: "src".to_string(),
            model_uri: "model".to_string(),
            entry_point: "transfer_learning.py".to_string(),
            instance_count: 1,
            instance_type: "ml.m5.2xlarge".to_string(),
            max_runtime_secs: 60,
            hyperparameters: Hyperparameters::new(),
            input_channels: BTreeMap::new(),
            output_path: "bucket/folder/".to_string(),
        }
    }

    #[tokio::test]
    async fn test_statuses_are_scripted_and_last_repeats() {
        let platform = InMemoryPlatform::new()
            .with_job_statuses([JobStatus::InProgress, JobStatus::Failed])
            .with_failure_reason("bad data");
        platform.create_training_job(&job("j")).await.unwrap();

        assert_eq!(platform.describe_training_job("j").await.unwrap().status, JobStatus::InProgress);
        let failed = platform.describe_training_job("j").await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("bad data"));
        assert_eq!(platform.describe_training_job("j").await.unwrap().status, JobStatus::Failed);
        assert_eq!(platform.describe_calls(), 3);
    }

    #[tokio::test]
    async fn test_describe_unknown_job() {
        let platform = InMemoryPlatform::new();
        let err = platform.describe_training_job("nope").await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_registry_restrictions() {
        let platform = InMemoryPlatform::new()
            .with_known_model(ModelRef::new("tab", "*"))
            .with_instance_types(["ml.m5.2xlarge"]);

        let bundle = platform
            .resolve_artifacts(&ModelRef::new("tab", "*"), ArtifactScope::Training, "ml.m5.2xlarge")
            .await
            .unwrap();
        assert!(bundle.model_uri.is_some());

        let inference = platform
            .resolve_artifacts(&ModelRef::new("tab", "*"), ArtifactScope::Inference, "ml.m5.2xlarge")
            .await
            .unwrap();
        assert!(inference.model_uri.is_none());

        assert!(matches!(
            platform
                .resolve_artifacts(&ModelRef::new("other", "*"), ArtifactScope::Training, "ml.m5.2xlarge")
                .await,
            Err(PlatformError::NotFound(_))
        ));
        assert!(matches!(
            platform
                .resolve_artifacts(&ModelRef::new("tab", "*"), ArtifactScope::Training, "ml.p3.nope")
                .await,
            Err(PlatformError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_deploy_then_invoke_with_uniform_response() {
        let platform = InMemoryPlatform::new();
        let request = DeployRequest {
            endpoint_name: "ep".to_string(),
            training_job_name: "j".to_string(),
            model_artifact: None,
            image_uri: "img".to_string(),
            script_uri: "src".to_string(),
            entry_point: "inference.py".to_string(),
            instance_count: 1,
            instance_type: "ml.m5.2xlarge".to_string(),
        };
        platform.deploy(&request).await.unwrap();

        let body = platform.invoke_endpoint("ep", "text/csv", b"a,b\nc,d\n".to_vec()).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["probabilities"].as_array().unwrap().len(), 2);
        assert_eq!(platform.invocations().len(), 1);

        platform.delete_endpoint("ep").await.unwrap();
        assert!(platform.list_endpoints().await.unwrap().is_empty());
        assert_eq!(platform.deleted_endpoints(), vec!["ep".to_string()]);
    }
}
