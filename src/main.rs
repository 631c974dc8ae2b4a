//! fsmlab - finite-state machine definition toolkit
//!
//! Validates hand-authored FSM definitions, runs inputs through them, and
//! enumerates competing transitions. Provides one-shot commands and a REPL.

mod commands;
mod config;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{Config, OutputFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fsmlab")]
#[command(about = "Parse, validate, and simulate finite-state machine definitions")]
#[command(version)]
struct Cli {
    /// YAML config file
    #[arg(short, long, env = "FSMLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (overrides config)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Log debug events to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL
    Repl {
        /// Definition file to load on start
        file: Option<PathBuf>,
    },

    /// Validate a definition file
    Check {
        /// Definition file
        file: PathBuf,
    },

    /// Show the parsed model
    Show {
        /// Definition file
        file: PathBuf,
    },

    /// Run an input through the machine
    Run {
        /// Definition file
        file: PathBuf,

        /// Input string
        #[arg(default_value = "")]
        input: String,
    },

    /// Enumerate competing transitions at every input position
    Steps {
        /// Definition file
        file: PathBuf,

        /// Input string
        #[arg(default_value = "")]
        input: String,
    },

    /// Build one experiment row per line of an inputs file
    Batch {
        /// Definition file
        file: PathBuf,

        /// File with one input per line
        inputs: PathBuf,
    },

    /// Print the effective configuration, or write it to a file
    Config {
        /// Write YAML here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // Load configuration (file from --config or FSMLAB_CONFIG, then env overrides)
    let mut config = match Config::load_from(cli.config.as_deref()) {
        Ok(c) => {
            if let Some(path) = &cli.config {
                tracing::debug!("Loaded config from {}", path.display());
            }
            c
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if cli.no_color {
        config.output.color = false;
    }
    if !config.output.color {
        colored::control::set_override(false);
    }

    match cli.command {
        Some(Commands::Repl { file }) => repl::run(&config, file)?,
        None => repl::run(&config, None)?,
        Some(cmd) => match commands::execute(cmd, &config) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
