//! Tabpipe Training
//!
//! The three pipeline stages for a tabular classifier on a managed platform:
//! - Preparing a dataset (`Preparer`): parse, remap labels, split, upload
//! - Training and deploying (`Orchestrator`): resolve artifacts, submit, wait, deploy
//! - Evaluating an endpoint (`Evaluator`): invoke, arg-max, score
//!
//! All platform access goes through the traits in `tabpipe_platform`, passed in
//! as explicit handles.

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod job;
pub mod layout;
pub mod metrics;
pub mod orchestrator;
pub mod prepare;
pub mod progress;
pub mod schema;
pub mod source;
pub mod split;
pub mod wait;

pub use config::{
    DatasetConfig, EvaluationConfig, ModelConfig, PipelineConfig, PlatformConfig, PollingConfig,
    StorageConfig,
};
pub use dataset::{TabularDataset, TabularRecord};
pub use error::{PipelineError, PipelineResult};
pub use evaluate::{Evaluator, select_endpoint};
pub use layout::{LocalLayout, StorageLayout};
pub use metrics::{ConfusionMatrix, EvaluationReport};
pub use orchestrator::{Orchestrator, TrainOutcome};
pub use prepare::{PreparationReport, Preparer};
pub use progress::{
    NullProgressSink, ProgressEvent, ProgressSink, Stage, StdoutProgressSink, TracingProgressSink,
};
pub use schema::{CategoricalIndex, TabularSchema};
pub use source::{DefaultSourceFetcher, HttpSourceFetcher, LocalSourceFetcher, SourceFetcher};
pub use split::{DatasetSplit, SplitFractions};
pub use wait::{WaitOutcome, WaitPolicy, wait_for_terminal};
