//! Command implementations for the tabpipe CLI.

pub mod config_cmd;
pub mod evaluate;
pub mod platform;
pub mod prepare;
pub mod train;

use std::sync::Arc;
use tabpipe_training::{ProgressSink, StdoutProgressSink, TracingProgressSink};

/// Human-readable progress on stdout, or tracing only when stdout carries JSON.
fn progress_sink(json: bool) -> Arc<dyn ProgressSink> {
    if json { Arc::new(TracingProgressSink) } else { Arc::new(StdoutProgressSink) }
}
