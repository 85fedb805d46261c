use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vantage::{BatchConfig, VantageConfig, count_file_lines, split_file, validate_file};

#[derive(Parser, Debug)]
#[command(
    name = "vantage-ingest",
    author,
    version,
    about = "Validate and batch JSONL documents for Vantage collections"
)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate every record of a JSONL file and report all invalid lines
    Validate {
        file: PathBuf,

        /// Tokenizer model, overrides `validation.model`
        #[arg(long)]
        model: Option<String>,

        /// Embeddings dimension of a user-provided-embeddings collection
        #[arg(long)]
        embeddings_dimension: Option<usize>,

        /// Report repeated ids
        #[arg(long)]
        reject_duplicate_ids: bool,

        /// Validate chunks of lines in parallel
        #[arg(long)]
        parallel: bool,
    },
    /// Split a JSONL file into batch files
    Split {
        file: PathBuf,

        /// Lines per batch, overrides `batching.batch_size`
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Directory the batch files are written to
        #[arg(short, long, default_value = "batches")]
        out_dir: PathBuf,
    },
    /// Count the lines of a file
    CountLines { file: PathBuf },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = match &args.config {
        Some(path) => VantageConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => VantageConfig::default(),
    };

    match args.command {
        Command::Validate {
            file,
            model,
            embeddings_dimension,
            reject_duplicate_ids,
            parallel,
        } => {
            if let Some(model) = model {
                config.validation.model = model;
            }
            if let Some(dimension) = embeddings_dimension {
                config.validation.user_provided_embeddings = true;
                config.validation.embeddings_dimension = Some(dimension);
            }
            config.validation.reject_duplicate_ids |= reject_duplicate_ids;

            let errors = validate_file(&config, &file, parallel)
                .with_context(|| format!("validating {}", file.display()))?;
            if errors.is_empty() {
                println!("{}: all records valid", file.display());
                return Ok(ExitCode::SUCCESS);
            }
            for err in &errors {
                println!("{err}");
            }
            eprintln!(
                "{}: {} invalid record(s)",
                file.display(),
                errors.len()
            );
            Ok(ExitCode::FAILURE)
        }
        Command::Split {
            file,
            batch_size,
            out_dir,
        } => {
            let batching = BatchConfig {
                batch_size: batch_size.unwrap_or(config.batching.batch_size),
            };
            let written = split_file(&file, batching, &out_dir)
                .with_context(|| format!("splitting {}", file.display()))?;
            for path in &written {
                println!("{}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::CountLines { file } => {
            let lines = count_file_lines(&file)
                .with_context(|| format!("counting lines of {}", file.display()))?;
            println!("{lines}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
