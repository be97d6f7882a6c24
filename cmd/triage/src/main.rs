//! Triage CLI - policy-driven triage for OTLP telemetry.
//!
//! Commands:
//! - `triage run` - Evaluate an OTLP export request against a policy file
//! - `triage check` - Parse and compile a policy file without evaluating

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::run::SignalArg;

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Policy-driven triage for OTLP telemetry records")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one OTLP export request against a policy file
    Run {
        /// Path to the policies JSON file
        #[arg(short, long, default_value = "policies.json")]
        policies: String,

        /// Path to the input export request (OTLP JSON or protobuf)
        #[arg(short, long)]
        input: String,

        /// Output path for the surviving request
        #[arg(short, long)]
        output: String,

        /// Signal carried by the input
        #[arg(short, long, value_enum)]
        signal: SignalArg,

        /// Optional output path for the match-stats JSON
        #[arg(long)]
        stats: Option<String>,
    },

    /// Parse and compile a policy file, reporting problems
    Check {
        /// Path to the policies JSON file
        #[arg(short, long, default_value = "policies.json")]
        policies: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run {
            policies,
            input,
            output,
            signal,
            stats,
        } => commands::run::run(&policies, &input, &output, signal, stats.as_deref()),
        Commands::Check { policies } => commands::check::run(&policies),
    }
}
