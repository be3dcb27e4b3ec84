use crate::config::ModelConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::layout::StorageLayout;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tabpipe_platform::{ArtifactBundle, ArtifactScope, DeployRequest, Hyperparameters, TrainingJobRequest};

/// Longest name the platform accepts for jobs and endpoints.
pub const MAX_NAME_LEN: usize = 63;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f";
const TIMESTAMP_LEN: usize = 23;

/// Name of the input channel the training script reads from.
pub const TRAINING_CHANNEL: &str = "training";

/// `<base>-<UTC yyyy-mm-dd-HH-MM-SS-mmm>`, with `base` cut at a char boundary
/// so the result fits in [`MAX_NAME_LEN`] bytes.
#[must_use]
pub fn name_from_base(base: &str, now: DateTime<Utc>) -> String {
    let mut keep = (MAX_NAME_LEN - TIMESTAMP_LEN - 1).min(base.len());
    while !base.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}-{}", &base[..keep], now.format(TIMESTAMP_FORMAT))
}

/// Registry defaults with `overrides` applied on top. Nothing else is added.
#[must_use]
pub fn merge_hyperparameters(defaults: Hyperparameters, overrides: &Hyperparameters) -> Hyperparameters {
    let mut merged = defaults;
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Build the single training job submission.
pub fn training_request(
    model: &ModelConfig,
    job_name: String,
    role_arn: String,
    bundle: &ArtifactBundle,
    hyperparameters: Hyperparameters,
    layout: &StorageLayout,
) -> PipelineResult<TrainingJobRequest> {
    let model_uri = bundle.model_uri.clone().ok_or_else(|| PipelineError::Resolution {
        model: model.model_ref(),
        scope: ArtifactScope::Training,
        source: tabpipe_platform::PlatformError::NotFound(
            "registry returned no base model artifact".to_string(),
        ),
    })?;

    let prefix = layout.training_prefix();
    Ok(TrainingJobRequest {
        job_name,
        role_arn,
        image_uri: bundle.image_uri.clone(),
        script_uri: bundle.script_uri.clone(),
        model_uri,
        entry_point: model.training_entry_point.clone(),
        instance_count: model.instance_count,
        instance_type: model.training_instance_type.clone(),
        max_runtime_secs: model.max_runtime_secs,
        hyperparameters,
        input_channels: BTreeMap::from([(TRAINING_CHANNEL.to_string(), prefix.clone())]),
        output_path: prefix,
    })
}

/// Build the endpoint deployment for a completed job.
#[must_use]
pub fn deploy_request(
    model: &ModelConfig,
    endpoint_name: String,
    training_job_name: &str,
    model_artifact: Option<String>,
    bundle: &ArtifactBundle,
) -> DeployRequest {
    DeployRequest {
        endpoint_name,
        training_job_name: training_job_name.to_string(),
        model_artifact,
        image_uri: bundle.image_uri.clone(),
        script_uri: bundle.script_uri.clone(),
        entry_point: model.inference_entry_point.clone(),
        instance_count: model.instance_count,
        instance_type: model.inference_instance_type.clone(),
    }
}
