//! Pipeline configuration file support.
//!
//! Every field has a default, so an empty file (or none at all) yields the
//! stock German credit pipeline. Files are merged key by key, lowest to highest:
//! 1. Defaults
//! 2. Global config (`~/.tabpipe/config.toml`)
//! 3. Local config (`./tabpipe.toml`)
//! 4. An explicit `--config` file
//! 5. `TABPIPE_*` environment variables
//!
//! CLI flags are applied on top by the binary.

use crate::error::{PipelineError, PipelineResult};
use crate::schema::{GERMAN_CREDIT_CATEGORICAL, TabularSchema};
use crate::split::SplitFractions;
use crate::wait::WaitPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabpipe_platform::{Hyperparameters, ModelRef};
use tracing::debug;

pub const GERMAN_CREDIT_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/statlog/german/german.data";

pub const ENV_BASE_URL: &str = "TABPIPE_BASE_URL";
pub const ENV_BUCKET: &str = "TABPIPE_BUCKET";
pub const ENV_EXECUTION_ROLE: &str = "TABPIPE_EXECUTION_ROLE";
pub const ENV_LOG_LEVEL: &str = "TABPIPE_LOG_LEVEL";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub log_level: String,
    pub platform: PlatformConfig,
    pub storage: StorageConfig,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub polling: PollingConfig,
    pub evaluation: EvaluationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            platform: PlatformConfig::default(),
            storage: StorageConfig::default(),
            dataset: DatasetConfig::default(),
            model: ModelConfig::default(),
            polling: PollingConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

/// Where the platform gateway lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub base_url: String,
    /// Name of the environment variable holding the bearer token.
    pub token_env: String,
    pub execution_role: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token_env: "TABPIPE_API_TOKEN".to_string(),
            execution_role: "tabpipe-execution-role".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Falls back to the platform's default bucket when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    pub folder: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { bucket: None, folder: "tab-transformer".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub source_url: String,
    pub local_dir: PathBuf,
    pub feature_count: usize,
    pub categorical: Vec<usize>,
    pub seed: u64,
    pub train_fraction: f64,
    pub validation_fraction: f64,
    pub test_fraction: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        let fractions = SplitFractions::default();
        Self {
            source_url: GERMAN_CREDIT_URL.to_string(),
            local_dir: PathBuf::from("data"),
            feature_count: 20,
            categorical: GERMAN_CREDIT_CATEGORICAL.to_vec(),
            seed: 42,
            train_fraction: fractions.train,
            validation_fraction: fractions.validation,
            test_fraction: fractions.test,
        }
    }
}

impl DatasetConfig {
    pub fn schema(&self) -> PipelineResult<TabularSchema> {
        TabularSchema::new(self.feature_count, self.categorical.clone())
    }

    #[must_use]
    pub fn fractions(&self) -> SplitFractions {
        SplitFractions {
            train: self.train_fraction,
            validation: self.validation_fraction,
            test: self.test_fraction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_id: String,
    pub version: String,
    pub training_instance_type: String,
    pub inference_instance_type: String,
    pub training_entry_point: String,
    pub inference_entry_point: String,
    pub instance_count: u32,
    pub max_runtime_secs: u64,
    pub job_name_base: String,
    pub endpoint_name_base: String,
    /// Applied over the registry defaults.
    pub hyperparameter_overrides: BTreeMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: "pytorch-tabtransformerclassification-model".to_string(),
            version: "*".to_string(),
            training_instance_type: "ml.m5.2xlarge".to_string(),
            inference_instance_type: "ml.m5.2xlarge".to_string(),
            training_entry_point: "transfer_learning.py".to_string(),
            inference_entry_point: "inference.py".to_string(),
            instance_count: 1,
            max_runtime_secs: 360_000,
            job_name_base: "tabtransformers".to_string(),
            endpoint_name_base: "tabtransformers-ep".to_string(),
            hyperparameter_overrides: BTreeMap::from([("epoch".to_string(), "100".to_string())]),
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub fn model_ref(&self) -> ModelRef {
        ModelRef::new(&self.model_id, &self.version)
    }

    #[must_use]
    pub fn overrides(&self) -> Hyperparameters {
        self.hyperparameter_overrides.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    /// 1.0 keeps the interval fixed.
    pub backoff_multiplier: f64,
    pub max_interval_secs: u64,
    /// Defaults to the job's max runtime plus one interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            backoff_multiplier: 1.0,
            max_interval_secs: 600,
            timeout_secs: None,
            max_attempts: None,
        }
    }
}

impl PollingConfig {
    /// Build the wait policy for a job allowed to run `max_runtime_secs`.
    #[must_use]
    pub fn wait_policy(&self, max_runtime_secs: u64) -> WaitPolicy {
        let interval = Duration::from_secs(self.interval_secs);
        let timeout = self.timeout_secs.map_or_else(
            || Duration::from_secs(max_runtime_secs) + interval,
            Duration::from_secs,
        );
        WaitPolicy {
            interval,
            backoff_multiplier: self.backoff_multiplier,
            max_interval: Duration::from_secs(self.max_interval_secs.max(self.interval_secs)),
            timeout,
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Endpoint to evaluate; the newest live endpoint when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub delete_endpoint: bool,
    pub content_type: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { endpoint: None, delete_endpoint: false, content_type: "text/csv".to_string() }
    }
}

impl PipelineConfig {
    /// Load one TOML file on top of the defaults.
    pub fn load_from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            PipelineError::InvalidConfig(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save_to_file(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> PipelineResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".tabpipe")
            .join("config.toml")
    }

    #[must_use]
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("tabpipe.toml")
    }

    /// Discover and merge configuration from the standard locations, the
    /// optional explicit file and the process environment.
    ///
    /// Missing global/local files are skipped; a missing explicit file is an error.
    pub fn discover_and_load(explicit: Option<&Path>) -> PipelineResult<Self> {
        let global = Self::default_global_path();
        let local = Self::default_local_path();
        let mut layers: Vec<&Path> = Vec::new();
        if global.is_file() {
            layers.push(&global);
        }
        if local.is_file() {
            layers.push(&local);
        }
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(PipelineError::InvalidConfig(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            layers.push(path);
        }

        let mut config = Self::load_layers(&layers)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Merge the given files over the defaults, later files winning per key.
    pub fn load_layers(paths: &[&Path]) -> PipelineResult<Self> {
        let mut merged = toml::Value::try_from(Self::default())?;
        for path in paths {
            debug!(path = %path.display(), "loading config layer");
            let content = std::fs::read_to_string(path).map_err(|e| {
                PipelineError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
            })?;
            let layer: toml::Value = toml::from_str(&content).map_err(|e| {
                PipelineError::InvalidConfig(format!("failed to parse {}: {}", path.display(), e))
            })?;
            merge_values(&mut merged, layer);
        }
        merged.try_into().map_err(|e: toml::de::Error| PipelineError::InvalidConfig(e.to_string()))
    }

    /// Apply `TABPIPE_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_BASE_URL) {
            self.platform.base_url = url;
        }
        if let Some(bucket) = get(ENV_BUCKET) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(role) = get(ENV_EXECUTION_ROLE) {
            self.platform.execution_role = role;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    /// Check everything a stage relies on before any stage runs.
    pub fn validate(&self) -> PipelineResult<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(PipelineError::InvalidConfig(format!(
                "log_level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }
        if self.platform.base_url.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("platform.base_url must not be empty".into()));
        }
        if self.storage.bucket.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(PipelineError::InvalidConfig("storage.bucket must not be empty".into()));
        }
        self.dataset.schema()?;
        self.dataset.fractions().validate()?;
        if self.model.model_id.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("model.model_id must not be empty".into()));
        }
        if self.model.instance_count == 0 {
            return Err(PipelineError::InvalidConfig("model.instance_count must be >= 1".into()));
        }
        self.polling.wait_policy(self.model.max_runtime_secs).validate()?;
        if self.evaluation.content_type.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "evaluation.content_type must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Recursive table merge: tables merge key by key, anything else is replaced.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
