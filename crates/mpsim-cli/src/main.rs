#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode};
use std::env;
use std::process;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "mpsim: parallel Markov-chain simulation of Moran processes",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Estimate fixation probabilities by batch simulation",
        long_about = "Simulate the two-type Moran process from a fixed start state until one\n\
                      type takes over, in parallel chunks, and report how often each type fixed.",
        after_help = "EXAMPLES:\n    # One A invader in a population of 20, B at fitness 0.9\n    \
                      mpsim fixation -n 20 --start 1 --fitness 0.9 --trajectories 10000\n\n\
                      # Reproducible run with trajectories written as JSON lines\n    \
                      mpsim fixation -n 10 --seed 42 --output runs.jsonl\n\n\
                      # Simulate on a previously compiled cache\n    \
                      mpsim fixation -n 10 --cache b3-<hash>"
    )]
    Fixation(cmd::fixation::FixationArgs),

    #[command(
        about = "Compute a stationary distribution by power iteration",
        long_about = "Iterate a mass vector under the transition matrix until successive\n\
                      vectors agree within a tolerance. Uses the two-type Moran process unless\n\
                      --edges names a JSON edge list.",
        after_help = "EXAMPLES:\n    # Long-run distribution of a 2-type process\n    \
                      mpsim stationary -n 10 --fitness 1.2\n\n\
                      # Arbitrary chain from a file of {source, target, weight} objects\n    \
                      mpsim stationary --edges chain.json --format json"
    )]
    Stationary(cmd::stationary::StationaryArgs),

    #[command(
        about = "Compile a Moran process and store the cache",
        after_help = "EXAMPLES:\n    # Content-addressed cache of the 2-type process\n    \
                      mpsim compile -n 50 --fitness 1.1\n\n\
                      # Named 3-type rock-scissors-paper cache\n    \
                      mpsim compile -n 30 --types 3 --key name --name rsp30"
    )]
    Compile(cmd::compile::CompileArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("MPSIM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "mpsim=debug,info"
        } else {
            "mpsim=info,warn"
        })
    });

    let format = env::var("MPSIM_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = output::resolve_output_mode(cli.format, cli.json);
    debug!(?output, root = %project_root.display(), "resolved output mode");

    let result = match &cli.command {
        Commands::Fixation(args) => cmd::fixation::run_fixation(args, output, &project_root),
        Commands::Stationary(args) => {
            cmd::stationary::run_stationary(args, output, &project_root)
        }
        Commands::Compile(args) => cmd::compile::run_compile(args, output, &project_root),
    };

    if let Err(err) = result {
        output::render_error(output, &CliError::from_anyhow(&err))?;
        process::exit(1);
    }
    Ok(())
}
