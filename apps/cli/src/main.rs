//! tabpipe CLI - prepare, train and evaluate a tabular classifier on a managed
//! ML platform.
//!
//! Each stage is a subcommand; `--dry-run` swaps the platform gateway for an
//! in-process platform so a stage can be exercised end to end offline.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::config_cmd::ConfigCommand;
use commands::{config_cmd, evaluate, prepare, train};

/// tabpipe - batch pipeline for a tabular binary classifier
#[derive(Parser, Debug)]
#[command(
    name = "tabpipe",
    author,
    version,
    about = "Prepare, train and evaluate a tabular classifier on a managed ML platform"
)]
struct Args {
    /// Log level (trace, debug, info, warn, error). Overrides config and TABPIPE_LOG_LEVEL.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Config file merged over ~/.tabpipe/config.toml and ./tabpipe.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download, split and upload the dataset
    ///
    /// Writes the test partition to <local_dir>/X_test.csv and y_test.csv and
    /// uploads train, validation and cat_index.json to object storage.
    Prepare {
        /// Dataset location (http(s) URL, file:// URL or local path)
        #[arg(long)]
        source: Option<String>,

        /// Directory for X_test.csv and y_test.csv
        #[arg(long)]
        local_dir: Option<PathBuf>,

        /// Target bucket (defaults to the platform's default bucket)
        #[arg(long)]
        bucket: Option<String>,

        /// Use the in-memory platform instead of the gateway
        #[arg(long)]
        dry_run: bool,

        /// Print the preparation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Submit a training job, wait for it and deploy an endpoint
    Train {
        /// Override the `epoch` hyperparameter
        #[arg(long)]
        epochs: Option<u32>,

        /// Use the in-memory platform instead of the gateway
        #[arg(long)]
        dry_run: bool,
    },

    /// Score a live endpoint on the local test partition
    Evaluate {
        /// Endpoint to evaluate (defaults to the newest)
        #[arg(long)]
        endpoint: Option<String>,

        /// Delete the endpoint after scoring
        #[arg(long)]
        delete_endpoint: bool,

        /// Use the in-memory platform instead of the gateway
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or initialise configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut pipeline = config::load(args.config.as_deref())?;
    if let Some(level) = &args.log_level {
        pipeline.log_level.clone_from(level);
    }

    let level = match pipeline.log_level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    // Logs go to stderr so `--json` output stays parseable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Prepare { source, local_dir, bucket, dry_run, json } => {
            config::apply_prepare_flags(&mut pipeline, source, local_dir, bucket);
            prepare::execute(&pipeline, dry_run, json).await?;
        }
        Command::Train { epochs, dry_run } => {
            config::apply_train_flags(&mut pipeline, epochs);
            train::execute(&pipeline, dry_run).await?;
        }
        Command::Evaluate { endpoint, delete_endpoint, dry_run, json } => {
            config::apply_evaluate_flags(&mut pipeline, endpoint, delete_endpoint);
            evaluate::execute(&pipeline, dry_run, json).await?;
        }
        Command::Config(command) => {
            config_cmd::execute(command, &pipeline)?;
        }
    }

    Ok(())
}
