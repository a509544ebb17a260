use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use mrpe::commands::{entries, parse, report};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mrpe")]
#[command(about = "Run legacy MRPE check plugins and print the agent section", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the agent configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every entry and print the <<<mrpe>>> section
    Report {
        /// Run entries concurrently
        #[arg(long, conflicts_with = "sequential")]
        parallel: bool,

        /// Run entries one after another, in configuration order
        #[arg(long)]
        sequential: bool,

        /// Per-entry timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// List the entries resolved from the configuration
    Entries {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse one check specification and show the resulting entry
    Parse {
        /// Check specification, e.g. "Load (60:yes) check_load -w 5"
        spec: String,

        /// Identity the check would run as
        #[arg(short, long)]
        user: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Report {
            parallel,
            sequential,
            timeout,
        } => {
            let parallel = match (parallel, sequential) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            report::execute(config, report::ReportOverrides { parallel, timeout })
        }
        Commands::Entries { json } => entries::execute(config, json),
        Commands::Parse { spec, user } => parse::execute(config, &spec, user.as_deref()),
    }
}
