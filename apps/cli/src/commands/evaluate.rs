//! Evaluate command implementation.

use anyhow::Context;
use colored::Colorize;
use tabpipe_platform::EndpointService;
use tabpipe_training::{EvaluationReport, Evaluator, PipelineConfig};

use super::{platform, progress_sink};

/// Execute the evaluate command.
pub async fn execute(config: &PipelineConfig, dry_run: bool, json: bool) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    let report = if dry_run {
        run(&platform::dry_run(), config, json).await?
    } else {
        run(&platform::gateway(config), config, json).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

async fn run<E: EndpointService>(
    endpoints: &E,
    config: &PipelineConfig,
    json: bool,
) -> anyhow::Result<EvaluationReport> {
    Evaluator::new(endpoints)
        .with_progress(progress_sink(json))
        .evaluate(&config.dataset, &config.evaluation)
        .await
        .context("evaluation failed")
}

fn print_report(report: &EvaluationReport) {
    println!("Endpoint: {}", report.endpoint);
    println!("{}:", "Evaluation result on test data".bold());
    println!("{}: {}", "Accuracy".bold(), report.accuracy);
    println!("{}: {}", "F1".bold(), report.f1);
    println!();
    println!("{}", "Confusion Matrix".bold());
    println!("{}", report.confusion_matrix);
}
