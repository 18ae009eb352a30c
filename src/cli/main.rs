//! job-audit command line

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use job_audit::config::{AuditConfig, sample_config};
use job_audit::database::DuckDbDatabase;
use job_audit::lineage::RowSource;
use job_audit::pipeline::{AuditPipeline, PipelineError, Stage};

#[derive(Parser)]
#[command(name = "job-audit", version, about = "Load job designs into an audit schema and derive column lineage")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, default_value = "job-audit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load documents, then recompute lineage
    Run(RunArgs),
    /// Load documents into the flattened tables only
    Load(RunArgs),
    /// Recompute the lineage tables from the last load
    Aggregate(RunArgs),
    /// Print a complete example configuration
    SampleConfig,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Override [paths] jobs_dir
    #[arg(long)]
    jobs_dir: Option<PathBuf>,

    /// Date stamped on written rows (YYYY-MM-DD, default today)
    #[arg(long)]
    execution_date: Option<String>,

    /// Where aggregation reads the flattened tables from
    #[arg(long, value_enum, default_value_t = Source::Database)]
    source: Source,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Snapshots,
    Database,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (stages, args) = match cli.command {
        Command::SampleConfig => {
            print!("{}", sample_config());
            return ExitCode::SUCCESS;
        }
        Command::Run(args) => (Stage::all(), args),
        Command::Load(args) => (vec![Stage::Load], args),
        Command::Aggregate(args) => (vec![Stage::Aggregate], args),
    };

    match run(&cli.config, &stages, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<PipelineError>() {
                Some(pipeline) => eprintln!("Error: {}", pipeline.user_message()),
                None => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &Path, stages: &[Stage], args: RunArgs) -> anyhow::Result<()> {
    let mut config = AuditConfig::from_file(config_path)
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .with_context(|| format!("Loading {}", config_path.display()))?;

    if let Some(dir) = args.jobs_dir {
        config.jobs_dir = dir;
    }

    if let Some(date) = &args.execution_date {
        chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("Invalid --execution-date '{}'", date))?;
    }

    let db = match &config.database_path {
        Some(path) => DuckDbDatabase::open(path),
        None => DuckDbDatabase::memory(),
    };

    let source = match args.source {
        Source::Snapshots => RowSource::Snapshots(config.snapshot_dir.clone()),
        Source::Database => RowSource::Database,
    };

    let mut pipeline = AuditPipeline::new(config, db).with_row_source(source);
    if let Some(date) = args.execution_date {
        pipeline = pipeline.with_execution_date(date);
    }

    let report = pipeline.run(stages)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }
    Ok(())
}
