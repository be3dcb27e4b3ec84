//! Train command implementation.

use anyhow::Context;
use colored::Colorize;
use tabpipe_platform::Platform;
use tabpipe_training::{Orchestrator, PipelineConfig, TrainOutcome};
use tracing::warn;

use super::{platform, progress_sink};

/// Execute the train command.
///
/// A failed training job is reported and turned into a non-zero exit.
pub async fn execute(config: &PipelineConfig, dry_run: bool) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    let outcome = if dry_run {
        run(&platform::dry_run(), config).await?
    } else {
        run(&platform::gateway(config), config).await?
    };

    match outcome {
        TrainOutcome::Deployed { job_name, endpoint_name, attempts } => {
            println!();
            println!("{}", "Endpoint deployed successfully".bold().green());
            println!("  training job: {}", job_name);
            println!("  endpoint:     {}", endpoint_name.cyan());
            println!("  status checks: {}", attempts);
            Ok(())
        }
        TrainOutcome::Failed { job_name, reason, .. } => {
            let reason = reason.unwrap_or_else(|| "no reason reported".to_string());
            eprintln!("{} {}: {}", "Training job failed".bold().red(), job_name, reason);
            anyhow::bail!("training job {} failed", job_name)
        }
    }
}

async fn run<P: Platform>(platform: &P, config: &PipelineConfig) -> anyhow::Result<TrainOutcome> {
    Orchestrator::new(platform)
        .with_progress(progress_sink(false))
        .run(config, shutdown_signal())
        .await
        .context("training failed")
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; waiting without cancellation");
        std::future::pending::<()>().await;
    }
}
