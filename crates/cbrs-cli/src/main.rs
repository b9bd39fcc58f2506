//! CBRS CLI - Fairness evaluation of recommendation results
//!
//! Usage:
//!   cbrs gini --recs <path>
//!   cbrs delta-gap --recs <path> --truth <path> [--groups <path>]
//!   cbrs pop-ratio --recs <path> --truth <path> [--groups <path>]
//!   cbrs pop-recs --recs <path> --truth <path> --algorithm <name>
//!   cbrs long-tail --recs <path> --algorithm <name>
//!   cbrs coverage --recs <path> --truth <path>
//!   cbrs report --recs <path> --truth <path> --algorithm <name> [--plots]

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Context;
use cbrs_core::{AppConfig, LoggingConfig};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::Session;

#[derive(Parser)]
#[command(name = "cbrs")]
#[command(about = "Fairness and popularity-bias evaluation for recommenders")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory for charts (overrides configuration)
    #[arg(long, global = true)]
    plot_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Recommendation input
#[derive(Args)]
struct RecsArgs {
    /// Recommendation table (csv, tsv, json, xlsx)
    #[arg(long)]
    recs: PathBuf,
}

/// Recommendation and ground-truth inputs
#[derive(Args)]
struct FramesArgs {
    /// Recommendation table (csv, tsv, json, xlsx)
    #[arg(long)]
    recs: PathBuf,

    /// Ground-truth rating table
    #[arg(long)]
    truth: PathBuf,
}

/// Result table output
#[derive(Args)]
struct OutputArgs {
    /// Also write the result table as CSV
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Gini index of each user's scores
    Gini {
        #[command(flatten)]
        input: RecsArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Delta-GAP per user group
    DeltaGap {
        #[command(flatten)]
        frames: FramesArgs,
        /// JSON file mapping group names to user ids (default: split by popularity)
        #[arg(long)]
        groups: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Share of popular items in profiles vs recommendations per user group
    PopRatio {
        #[command(flatten)]
        frames: FramesArgs,
        /// JSON file mapping group names to user ids (default: split by popularity)
        #[arg(long)]
        groups: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Scatter plots of item popularity vs recommendation frequency
    PopRecs {
        #[command(flatten)]
        frames: FramesArgs,
        /// Algorithm name, used as chart title
        #[arg(short, long)]
        algorithm: String,
        /// Chart file name without extension (default: algorithm name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Line plot of recommendation counts per item
    LongTail {
        #[command(flatten)]
        input: RecsArgs,
        /// Algorithm name, used as chart title
        #[arg(short, long)]
        algorithm: String,
        /// Chart file name without extension (default: algorithm name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Percentage of the ground-truth catalog that is recommended
    Coverage {
        #[command(flatten)]
        frames: FramesArgs,
    },
    /// Run every metric and print a summary
    Report {
        #[command(flatten)]
        frames: FramesArgs,
        /// Algorithm name
        #[arg(short, long, default_value = "recommender")]
        algorithm: String,
        /// JSON file mapping group names to user ids (default: split by popularity)
        #[arg(long)]
        groups: Option<PathBuf>,
        /// Also write the pop-recs and long-tail charts
        #[arg(long)]
        plots: bool,
    },
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    if let Some(dir) = &cli.plot_dir {
        config.plot.output_dir = dir.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli).context("invalid configuration")?;
    init_tracing(&config.logging, cli.verbose);

    let session = Session::new(config);
    let json = cli.json;

    match cli.command {
        Commands::Gini { input, output } => {
            session.gini(&input.recs, output.output.as_deref(), json)?;
        }
        Commands::DeltaGap {
            frames,
            groups,
            output,
        } => {
            session.delta_gap(
                &frames.recs,
                &frames.truth,
                groups.as_deref(),
                output.output.as_deref(),
                json,
            )?;
        }
        Commands::PopRatio {
            frames,
            groups,
            output,
        } => {
            session.pop_ratio(
                &frames.recs,
                &frames.truth,
                groups.as_deref(),
                output.output.as_deref(),
                json,
            )?;
        }
        Commands::PopRecs {
            frames,
            algorithm,
            name,
        } => {
            session.pop_recs(&frames.recs, &frames.truth, &algorithm, name.as_deref())?;
        }
        Commands::LongTail {
            input,
            algorithm,
            name,
        } => {
            session.long_tail(&input.recs, &algorithm, name.as_deref())?;
        }
        Commands::Coverage { frames } => {
            session.coverage(&frames.recs, &frames.truth, json)?;
        }
        Commands::Report {
            frames,
            algorithm,
            groups,
            plots,
        } => {
            session.report(
                &frames.recs,
                &frames.truth,
                &algorithm,
                groups.as_deref(),
                plots,
                json,
            )?;
        }
    }

    Ok(())
}
