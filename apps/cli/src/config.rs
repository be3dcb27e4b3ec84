//! CLI configuration loading and flag overrides.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tabpipe_training::PipelineConfig;

/// Load and merge pipeline configuration.
///
/// Configuration precedence:
/// 1. CLI flags (applied by the `apply_*` helpers)
/// 2. Environment variables (`TABPIPE_*`)
/// 3. Explicit `--config` file
/// 4. Local config file (./tabpipe.toml)
/// 5. Global config file (~/.tabpipe/config.toml)
/// 6. Defaults
pub fn load(explicit: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    PipelineConfig::discover_and_load(explicit).context("failed to load configuration")
}

pub fn apply_prepare_flags(
    config: &mut PipelineConfig,
    source: Option<String>,
    local_dir: Option<PathBuf>,
    bucket: Option<String>,
) {
    if let Some(source) = source {
        config.dataset.source_url = source;
    }
    if let Some(dir) = local_dir {
        config.dataset.local_dir = dir;
    }
    if bucket.is_some() {
        config.storage.bucket = bucket;
    }
}

pub fn apply_train_flags(config: &mut PipelineConfig, epochs: Option<u32>) {
    if let Some(epochs) = epochs {
        config.model.hyperparameter_overrides.insert("epoch".to_string(), epochs.to_string());
    }
}

pub fn apply_evaluate_flags(
    config: &mut PipelineConfig,
    endpoint: Option<String>,
    delete_endpoint: bool,
) {
    if endpoint.is_some() {
        config.evaluation.endpoint = endpoint;
    }
    if delete_endpoint {
        config.evaluation.delete_endpoint = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config = PipelineConfig::default();
        apply_prepare_flags(&mut config, Some("/tmp/german.data".to_string()), None, None);
        apply_train_flags(&mut config, Some(5));
        apply_evaluate_flags(&mut config, Some("ep-1".to_string()), true);

        assert_eq!(config.dataset.source_url, "/tmp/german.data");
        assert_eq!(config.dataset.local_dir, PathBuf::from("data"));
        assert_eq!(config.model.hyperparameter_overrides["epoch"], "5");
        assert_eq!(config.evaluation.endpoint.as_deref(), Some("ep-1"));
        assert!(config.evaluation.delete_endpoint);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let mut config = PipelineConfig::default();
        config.storage.bucket = Some("from-file".to_string());
        apply_prepare_flags(&mut config, None, None, None);
        apply_evaluate_flags(&mut config, None, false);

        assert_eq!(config.storage.bucket.as_deref(), Some("from-file"));
        assert!(!config.evaluation.delete_endpoint);
    }
}
