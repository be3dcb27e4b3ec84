//! Bounded, cancellable polling of a training job until it reaches a terminal status.

use crate::error::{PipelineError, PipelineResult};
use crate::progress::{ProgressEvent, ProgressSink};
use std::future::Future;
use std::time::Duration;
use tabpipe_platform::{TrainingJobDescription, TrainingService};
use tokio::time::Instant;
use tracing::{debug, info};

/// How often and how long to poll a job.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    /// Delay after the first non-terminal poll.
    pub interval: Duration,
    /// Factor applied to the delay after every poll. 1.0 keeps it fixed.
    pub backoff_multiplier: f64,
    /// Upper bound for the delay.
    pub max_interval: Duration,
    /// Give up once this much time has passed since the first poll.
    pub timeout: Duration,
    /// Give up after this many polls.
    pub max_attempts: Option<u32>,
}

impl WaitPolicy {
    #[must_use]
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self { interval, backoff_multiplier: 1.0, max_interval: interval, timeout, max_attempts: None }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.interval.is_zero() {
            return Err(PipelineError::InvalidConfig("polling interval must be positive".into()));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "backoff multiplier must be >= 1, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_interval < self.interval {
            return Err(PipelineError::InvalidConfig(
                "max polling interval must not be below the interval".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(PipelineError::InvalidConfig("max attempts must be >= 1".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        // A delay too large for `Duration` is clamped to the cap.
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }
}

/// The terminal description plus how many polls it took.
#[derive(Debug, Clone)]
pub struct WaitOutcome {
    pub description: TrainingJobDescription,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Poll `job_name` until it is `Completed` or `Failed`.
///
/// Returns a distinct error on timeout, attempt exhaustion or when `shutdown`
/// resolves. None of those stop the remote job.
pub async fn wait_for_terminal<S, F>(
    service: &S,
    job_name: &str,
    policy: &WaitPolicy,
    progress: &dyn ProgressSink,
    shutdown: F,
) -> PipelineResult<WaitOutcome>
where
    S: TrainingService + ?Sized,
    F: Future<Output = ()>,
{
    policy.validate()?;
    tokio::pin!(shutdown);

    let start = Instant::now();
    let mut delay = policy.interval;
    let mut attempts = 0_u32;

    loop {
        attempts += 1;
        let description = service.describe_training_job(job_name).await?;
        debug!(job = job_name, status = %description.status, attempts, "polled training job");
        progress.on_event(ProgressEvent::Polled {
            job_name: job_name.to_string(),
            status: description.status.clone(),
            attempt: attempts,
        });

        if description.status.is_terminal() {
            let elapsed = start.elapsed();
            info!(job = job_name, status = %description.status, attempts, ?elapsed, "training job finished");
            return Ok(WaitOutcome { description, attempts, elapsed });
        }

        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(PipelineError::AttemptsExhausted { job_name: job_name.to_string(), attempts });
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(PipelineError::WaitTimeout { job_name: job_name.to_string(), waited: elapsed });
        }

        // One last poll lands exactly on the deadline.
        let sleep_for = delay.min(policy.timeout - elapsed);
        tokio::select! {
            () = &mut shutdown => {
                info!(job = job_name, attempts, "stopped waiting on shutdown request");
                return Err(PipelineError::Cancelled { job_name: job_name.to_string() });
            }
            () = tokio::time::sleep(sleep_for) => {}
        }
        delay = policy.next_delay(delay);
    }
}
