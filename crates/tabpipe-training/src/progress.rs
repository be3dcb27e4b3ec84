use serde::{Deserialize, Serialize};
use std::fmt;
use tabpipe_platform::JobStatus;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prepare,
    Train,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => write!(f, "prepare"),
            Self::Train => write!(f, "train"),
            Self::Evaluate => write!(f, "evaluate"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started { stage: Stage },
    Message { stage: Stage, message: String },
    Polled { job_name: String, status: JobStatus, attempt: u32 },
    Finished { stage: Stage },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { stage } => println!("[{stage}] started"),
            ProgressEvent::Message { stage, message } => println!("[{stage}] {message}"),
            ProgressEvent::Polled { job_name, status, attempt } => {
                if status.is_terminal() {
                    println!("[train:{job_name}] status {status} (check {attempt})");
                } else {
                    println!("Training job is not yet complete. Waiting...");
                }
            }
            ProgressEvent::Finished { stage } => println!("[{stage}] finished"),
        }
    }
}

/// Routes events to `tracing` instead of stdout.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { stage } => info!(%stage, "stage started"),
            ProgressEvent::Message { stage, message } => info!(%stage, "{}", message),
            ProgressEvent::Polled { job_name, status, attempt } => {
                info!(job = %job_name, %status, attempt, "polled training job");
            }
            ProgressEvent::Finished { stage } => info!(%stage, "stage finished"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_event(&self, _event: ProgressEvent) {}
}
