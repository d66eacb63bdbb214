//! CLI command definitions for veriflow.
//!
//! This module provides the command-line interface for submitting a dataset
//! and a processor module to an execution backend and printing the report.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use crate::cluster::{ClusterClient, HttpClusterClient};
use crate::config::EngineConfig;
use crate::engine::{
    ClusterEngine, DataSource, ProcessorModule, TaskGraphEngine, ValidationBackend,
};

/// Data-validation runner for pipeline clusters.
#[derive(Parser)]
#[command(name = "veriflow")]
#[command(about = "Run data-validation processors on a pipeline cluster")]
#[command(version)]
#[command(
    long_about = "veriflow stages a dataset and a processor module into a pipeline cluster,\nwaits for the validation job to produce its report, and prints it.\n\nExample usage:\n  veriflow process ./survey.csv ./checks.py\n  veriflow process 2026/survey.csv ./checks.py --bucket datasets"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run a processor module against a dataset and print the report.
    #[command(alias = "run")]
    Process(ProcessArgs),

    /// Show the current job state of a pipeline on the cluster.
    Status(StatusArgs),
}

/// Execution backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Provision a session on the pipeline cluster.
    Cluster,
    /// Submit directly to the task-graph scheduler.
    Taskgraph,
}

/// Arguments for `veriflow process`.
#[derive(Parser, Debug)]
pub struct ProcessArgs {
    /// Dataset to validate: a local file path, or an object key when
    /// `--bucket` is given.
    pub dataset: String,

    /// Path to the processor module to run.
    pub module: PathBuf,

    /// Execution backend.
    #[arg(short, long, value_enum, default_value_t = Backend::Cluster)]
    pub engine: Backend,

    /// Treat the dataset argument as a key in this object-store bucket; the
    /// cluster fetches it itself instead of the CLI uploading it.
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Pipeline template to use instead of the built-in one.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Suppress the per-poll progress dots.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for `veriflow status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Name of the pipeline to inspect.
    pub pipeline: String,

    /// Also print the job's log lines.
    #[arg(long)]
    pub logs: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the veriflow CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Process(args) => {
            run_process_command(args).await?;
        }
        Commands::Status(args) => {
            run_status_command(args).await?;
        }
    }
    Ok(())
}

async fn run_process_command(mut args: ProcessArgs) -> anyhow::Result<()> {
    let mut config = EngineConfig::from_env()?;
    if let Some(template) = args.template.take() {
        config = config.with_template_path(template);
    }

    let dataset = load_dataset(&args).await?;
    let module = load_module(&args.module).await?;

    tracing::info!(
        dataset = %dataset.filename(),
        module = %module.name,
        backend = ?args.engine,
        "starting validation run"
    );

    let backend: Box<dyn ValidationBackend> = match args.engine {
        Backend::Cluster => {
            let client: Arc<dyn ClusterClient> = Arc::new(HttpClusterClient::new(
                &config.cluster_address,
                config.request_timeout,
            ));
            let engine = ClusterEngine::new(client, &config)?;
            let engine = if args.quiet {
                engine
            } else {
                engine.with_progress(Arc::new(progress_dot))
            };
            Box::new(engine)
        }
        Backend::Taskgraph => Box::new(TaskGraphEngine::new(&config)),
    };

    let report = backend.run(dataset, module).await;
    if !args.quiet {
        // End the progress-dot line before printing anything else.
        println!();
    }

    println!("{}", report?);
    Ok(())
}

async fn run_status_command(args: StatusArgs) -> anyhow::Result<()> {
    let config = EngineConfig::from_env()?;
    let client = HttpClusterClient::new(&config.cluster_address, config.request_timeout);

    let state = client.job_state(&args.pipeline).await?;
    println!("{}: {}", args.pipeline, state);

    if args.logs {
        for line in client.job_logs(&args.pipeline).await? {
            println!("{line}");
        }
    }
    Ok(())
}

/// Builds the dataset source: an object-store reference when a bucket is
/// given, otherwise the file contents read from disk.
async fn load_dataset(args: &ProcessArgs) -> anyhow::Result<DataSource> {
    if let Some(bucket) = &args.bucket {
        return Ok(DataSource::Remote {
            bucket: bucket.clone(),
            key: args.dataset.clone(),
        });
    }

    let path = Path::new(&args.dataset);
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read dataset '{}': {}", args.dataset, e))?;
    Ok(DataSource::Inline {
        filename: basename(path)?,
        content,
    })
}

async fn load_module(path: &Path) -> anyhow::Result<ProcessorModule> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read module '{}': {}", path.display(), e))?;
    Ok(ProcessorModule::new(basename(path)?, content))
}

fn basename(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Path has no usable file name: {}", path.display()))
}

fn progress_dot() {
    print!(".");
    let _ = std::io::stdout().flush();
}
