//! Prepare command implementation.

use anyhow::Context;
use colored::Colorize;
use tabpipe_platform::ObjectStore;
use tabpipe_training::{PipelineConfig, PreparationReport, Preparer};

use super::{platform, progress_sink};

/// Execute the prepare command.
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
        print_report(&report, dry_run);
    }
    Ok(())
}

async fn run<S: ObjectStore>(
    store: &S,
    config: &PipelineConfig,
    json: bool,
) -> anyhow::Result<PreparationReport> {
    Preparer::new(store)
        .with_progress(progress_sink(json))
        .prepare(&config.dataset, &config.storage)
        .await
        .context("dataset preparation failed")
}

fn print_report(report: &PreparationReport, dry_run: bool) {
    println!();
    println!("{}", "Dataset prepared".bold().green());
    if dry_run {
        println!("  {}", "(dry run: nothing was uploaded)".dimmed());
    }
    println!(
        "  rows: {} (train {}, validation {}, test {})",
        report.total_rows, report.train_rows, report.validation_rows, report.test_rows
    );
    println!("  train:       {}", report.train_location);
    println!("  validation:  {}", report.validation_location);
    println!("  cat_index:   {}", report.categorical_index_location);
    println!("  X_test:      {}", report.features_path.display());
    println!("  y_test:      {}", report.labels_path.display());
    println!("  hash:        {}", report.content_hash.dimmed());
}
