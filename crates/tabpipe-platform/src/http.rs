//! REST client for a managed platform gateway.
//!
//! All four platform traits are served by one gateway under `/v1`. Requests
//! carry an optional bearer token; non-success statuses are mapped onto
//! [`PlatformError`] by [`map_http_error`].

use crate::types::{
    ArtifactBundle, ArtifactScope, DeployRequest, EndpointSummary, Hyperparameters, JobStatus,
    ModelRef, ObjectLocation, TrainingJobDescription, TrainingJobHandle, TrainingJobRequest,
};
use crate::{EndpointService, ModelRegistry, ObjectStore, PlatformError, PlatformResult, TrainingService};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::env;
use tracing::{debug, error};

/// HTTP implementation of the platform traits.
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    /// Gateway base URL without the `/v1` suffix.
    base_url: String,
    /// Optional bearer token.
    api_token: Option<String>,
    /// HTTP client for making requests.
    client: Client,
}

impl HttpPlatform {
    /// Creates a client that sends unauthenticated requests.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_token: None, client: Client::new() }
    }

    /// Creates a client that authenticates with `api_token`.
    #[must_use]
    pub fn with_token(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), api_token: Some(api_token.into()), client: Client::new() }
    }

    /// Creates a client reading its token from the environment variable `token_env`.
    ///
    /// A missing variable is not an error; requests are then sent without a token.
    #[must_use]
    pub fn from_env(base_url: impl Into<String>, token_env: &str) -> Self {
        match env::var(token_env) {
            Ok(token) if !token.trim().is_empty() => Self::with_token(base_url, token),
            _ => {
                debug!(token_env = %token_env, "No platform token in environment");
                Self::new(base_url)
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> PlatformResult<Response> {
        let builder = match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, operation = %operation, "Failed to reach platform gateway");
            PlatformError::Request(format!("Network error during {}: {}", operation, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                operation = %operation,
                error = %error_text,
                "Platform gateway returned error status"
            );
            return Err(map_http_error(status, &error_text, operation));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response, operation: &str) -> PlatformResult<T> {
        response.json::<T>().await.map_err(|e| {
            error!(error = %e, operation = %operation, "Failed to parse platform response");
            PlatformError::Serialization(format!("Failed to parse {} response: {}", operation, e))
        })
    }
}

/// Map a non-success gateway status onto a platform error.
fn map_http_error(status: StatusCode, error_text: &str, operation: &str) -> PlatformError {
    match status.as_u16() {
        400 | 422 => {
            PlatformError::Unsupported(format!("Rejected request for {}: {}", operation, error_text))
        }
        401 | 403 => PlatformError::Unauthorized(format!(
            "Authentication failed for {}: {}",
            operation, error_text
        )),
        404 => PlatformError::NotFound(format!("Not found for {}: {}", operation, error_text)),
        code => PlatformError::Api { status: code, body: error_text.to_string() },
    }
}

#[derive(Debug, Deserialize)]
struct BucketResponse {
    bucket: String,
}

#[derive(Debug, Deserialize)]
struct RoleResponse {
    arn: String,
}

#[derive(Debug, Deserialize)]
struct EndpointNameResponse {
    endpoint_name: String,
}

/// The gateway does not echo the job name back.
#[derive(Debug, Deserialize)]
struct DescribeJobResponse {
    status: JobStatus,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    model_artifact: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EndpointListResponse {
    #[serde(default)]
    endpoints: Vec<EndpointSummary>,
}

#[async_trait]
impl ObjectStore for HttpPlatform {
    async fn default_bucket(&self) -> PlatformResult<String> {
        let response =
            self.send(self.client.get(self.url("/storage/default-bucket")), "default bucket").await?;
        let body: BucketResponse = Self::decode(response, "default bucket").await?;
        Ok(body.bucket)
    }

    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Vec<u8>,
        content_type: &str,
    ) -> PlatformResult<()> {
        debug!(location = %location, bytes = body.len(), "Uploading object");
        let url = self.url(&format!("/storage/{}/{}", location.bucket, location.key));
        let request = self.client.put(url).header(CONTENT_TYPE, content_type).body(body);
        self.send(request, "put object").await?;
        Ok(())
    }
}

#[async_trait]
impl ModelRegistry for HttpPlatform {
    async fn resolve_artifacts(
        &self,
        model: &ModelRef,
        scope: ArtifactScope,
        instance_type: &str,
    ) -> PlatformResult<ArtifactBundle> {
        let url = self.url(&format!(
            "/registry/models/{}/versions/{}/artifacts",
            model.model_id, model.version
        ));
        let request =
            self.client.get(url).query(&[("scope", scope.as_str()), ("instance_type", instance_type)]);
        let response = self.send(request, "resolve artifacts").await?;
        Self::decode(response, "resolve artifacts").await
    }

    async fn default_hyperparameters(&self, model: &ModelRef) -> PlatformResult<Hyperparameters> {
        let url = self.url(&format!(
            "/registry/models/{}/versions/{}/hyperparameters",
            model.model_id, model.version
        ));
        let response = self.send(self.client.get(url), "default hyperparameters").await?;
        Self::decode(response, "default hyperparameters").await
    }
}

#[async_trait]
impl TrainingService for HttpPlatform {
    async fn execution_role_arn(&self, role_name: &str) -> PlatformResult<String> {
        let url = self.url(&format!("/iam/roles/{}", role_name));
        let response = self.send(self.client.get(url), "get role").await?;
        let body: RoleResponse = Self::decode(response, "get role").await?;
        Ok(body.arn)
    }

    async fn create_training_job(
        &self,
        request: &TrainingJobRequest,
    ) -> PlatformResult<TrainingJobHandle> {
        let builder = self.client.post(self.url("/training-jobs")).json(request);
        let response = self.send(builder, "create training job").await?;
        Self::decode(response, "create training job").await
    }

    async fn describe_training_job(
        &self,
        job_name: &str,
    ) -> PlatformResult<TrainingJobDescription> {
        let url = self.url(&format!("/training-jobs/{}", job_name));
        let response = self.send(self.client.get(url), "describe training job").await?;
        let body: DescribeJobResponse = Self::decode(response, "describe training job").await?;
        Ok(TrainingJobDescription {
            job_name: job_name.to_string(),
            status: body.status,
            failure_reason: body.failure_reason,
            model_artifact: body.model_artifact,
        })
    }
}

#[async_trait]
impl EndpointService for HttpPlatform {
    async fn deploy(&self, request: &DeployRequest) -> PlatformResult<String> {
        let builder = self.client.post(self.url("/endpoints")).json(request);
        let response = self.send(builder, "deploy endpoint").await?;
        let body: EndpointNameResponse = Self::decode(response, "deploy endpoint").await?;
        Ok(body.endpoint_name)
    }

    async fn list_endpoints(&self) -> PlatformResult<Vec<EndpointSummary>> {
        let response = self.send(self.client.get(self.url("/endpoints")), "list endpoints").await?;
        let body: EndpointListResponse = Self::decode(response, "list endpoints").await?;
        Ok(body.endpoints)
    }

    async fn delete_endpoint(&self, endpoint_name: &str) -> PlatformResult<()> {
        let url = self.url(&format!("/endpoints/{}", endpoint_name));
        self.send(self.client.delete(url), "delete endpoint").await?;
        Ok(())
    }

    async fn invoke_endpoint(
        &self,
        endpoint_name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> PlatformResult<Vec<u8>> {
        let url = self.url(&format!("/endpoints/{}/invocations", endpoint_name));
        let request = self.client.post(url).header(CONTENT_TYPE, content_type).body(body);
        let response = self.send(request, "invoke endpoint").await?;
        let bytes = response.bytes().await.map_err(|e| {
            PlatformError::Request(format!("Failed to read invocation response: {}", e))
        })?;
        Ok(bytes.to_vec())
    }
}
