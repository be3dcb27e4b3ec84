//! Training and deployment: resolve artifacts, submit one job, wait for it and
//! deploy one endpoint when it completes.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::job::{deploy_request, merge_hyperparameters, name_from_base, training_request};
use crate::layout::StorageLayout;
use crate::progress::{NullProgressSink, ProgressEvent, ProgressSink, Stage};
use crate::wait::wait_for_terminal;
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tabpipe_platform::{
    ArtifactBundle, ArtifactScope, JobStatus, ModelRef, Platform, TrainingJobDescription,
};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrainOutcome {
    Deployed { job_name: String, endpoint_name: String, attempts: u32 },
    Failed { job_name: String, reason: Option<String>, attempts: u32 },
}

impl TrainOutcome {
    #[must_use]
    pub fn job_name(&self) -> &str {
        match self {
            Self::Deployed { job_name, .. } | Self::Failed { job_name, .. } => job_name,
        }
    }

    #[must_use]
    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed { .. })
    }
}

pub struct Orchestrator<'a> {
    platform: &'a dyn Platform,
    progress: Arc<dyn ProgressSink>,
}

impl<'a> Orchestrator<'a> {
    pub fn new<P: Platform>(platform: &'a P) -> Self {
        Self { platform, progress: Arc::new(NullProgressSink) }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    async fn resolve(
        &self,
        model: &ModelRef,
        scope: ArtifactScope,
        instance_type: &str,
    ) -> PipelineResult<ArtifactBundle> {
        self.platform.resolve_artifacts(model, scope, instance_type).await.map_err(|source| {
            PipelineError::Resolution { model: model.clone(), scope, source }
        })
    }

    fn message(&self, message: impl Into<String>) {
        self.progress.on_event(ProgressEvent::Message { stage: Stage::Train, message: message.into() });
    }

    /// Submit one training job and, if it completes, deploy one endpoint.
    ///
    /// Nothing is submitted unless the role, the training artifacts and the
    /// default hyperparameters all resolve. `shutdown` stops the wait without
    /// touching the remote job.
    pub async fn run<F>(&self, config: &PipelineConfig, shutdown: F) -> PipelineResult<TrainOutcome>
    where
        F: Future<Output = ()>,
    {
        self.progress.on_event(ProgressEvent::Started { stage: Stage::Train });
        let model_config = &config.model;
        let model = model_config.model_ref();

        let bucket = match &config.storage.bucket {
            Some(bucket) => bucket.clone(),
            None => self.platform.default_bucket().await?,
        };
        let layout = StorageLayout::new(bucket, &config.storage.folder);

        let role_arn = self.platform.execution_role_arn(&config.platform.execution_role).await?;
        let bundle =
            self.resolve(&model, ArtifactScope::Training, &model_config.training_instance_type).await?;
        let defaults = self.platform.default_hyperparameters(&model).await.map_err(|source| {
            PipelineError::Resolution { model: model.clone(), scope: ArtifactScope::Training, source }
        })?;
        let hyperparameters = merge_hyperparameters(defaults, &model_config.overrides());

        let job_name = name_from_base(&model_config.job_name_base, Utc::now());
        let request =
            training_request(model_config, job_name, role_arn, &bundle, hyperparameters, &layout)?;
        let handle = self.platform.create_training_job(&request).await?;
        info!(
            job = %handle.job_name,
            model = %model,
            instance_type = %request.instance_type,
            input = %layout.training_prefix(),
            "submitted training job"
        );
        self.message(format!("Submitted training job {}", handle.job_name));

        let policy = config.polling.wait_policy(model_config.max_runtime_secs);
        let waited =
            wait_for_terminal(self.platform, &handle.job_name, &policy, &*self.progress, shutdown).await?;

        let outcome = match waited.description.status {
            JobStatus::Completed => {
                self.message("Training job completed successfully - deploying endpoint");
                let inference = self
                    .resolve(&model, ArtifactScope::Inference, &model_config.inference_instance_type)
                    .await?;
                let endpoint_name = name_from_base(&model_config.endpoint_name_base, Utc::now());
                let deploy = deploy_request(
                    model_config,
                    endpoint_name,
                    &handle.job_name,
                    waited.description.model_artifact.clone(),
                    &inference,
                );
                let endpoint_name = self.platform.deploy(&deploy).await?;
                info!(job = %handle.job_name, endpoint = %endpoint_name, "endpoint deployed");
                self.message(format!("Endpoint {} deployed successfully", endpoint_name));
                TrainOutcome::Deployed {
                    job_name: handle.job_name,
                    endpoint_name,
                    attempts: waited.attempts,
                }
            }
            _ => {
                let outcome = failed_outcome(handle.job_name, &waited.description, waited.attempts)?;
                self.message("Training job failed");
                outcome
            }
        };

        self.progress.on_event(ProgressEvent::Finished { stage: Stage::Train });
        Ok(outcome)
    }
}

/// Outcome for a job that stopped without completing. Only `Failed` is an
/// expected terminal status here.
fn failed_outcome(
    job_name: String,
    description: &TrainingJobDescription,
    attempts: u32,
) -> PipelineResult<TrainOutcome> {
    match &description.status {
        JobStatus::Failed => {
            let reason = description.failure_reason.clone();
            warn!(job = %job_name, reason = ?reason, "training job failed");
            Ok(TrainOutcome::Failed { job_name, reason, attempts })
        }
        other => Err(PipelineError::UnexpectedStatus { job_name, status: other.to_string() }),
    }
}
