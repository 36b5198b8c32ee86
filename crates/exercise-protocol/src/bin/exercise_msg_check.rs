//! exercise-msg-check: Validate exercise channel message fixtures.
//!
//! Each file holds one JSON message or an array of messages. Every entry is
//! classified and reported on its own line.
//!
//! # Usage
//!
//! ```bash
//! exercise-msg-check --direction from-iframe fixtures/guest/*.json
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use exercise_protocol::check::{check_file, Direction};
use log::{error, info};

/// Validate exercise iframe channel messages.
#[derive(Parser, Debug)]
#[command(name = "exercise-msg-check")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON files to check
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Message direction: to-iframe, from-iframe or auto
    #[arg(short, long, default_value = "auto")]
    direction: Direction,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> anyhow::Result<usize> {
    let mut invalid = 0;
    for path in &args.files {
        let report = check_file(path, args.direction)
            .with_context(|| format!("failed to check {}", path.display()))?;
        for entry in &report.entries {
            match &entry.outcome {
                Ok(classified) => {
                    println!("{}[{}]: ok ({})", path.display(), entry.index, classified.label())
                }
                Err(e) => println!("{}[{}]: invalid: {}", path.display(), entry.index, e),
            }
        }
        invalid += report.invalid_count();
    }
    Ok(invalid)
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    match run(&args) {
        Ok(0) => info!("All messages valid"),
        Ok(invalid) => {
            error!("{} invalid message(s)", invalid);
            process::exit(1);
        }
        Err(e) => {
            error!("{:#}", e);
            process::exit(2);
        }
    }
}
