//! Command execution.

use crate::config::{Config, OutputFormat, UploadConfig};
use crate::Commands;
use colored::Colorize;
use fsmlab_core::{
    run_batch, Enumeration, ExperimentRow, ExperimentSummary, FsmData, FsmValidationError,
    RunResult, Simulator,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to turn a definition file into a model.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{}': {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{}' does not have an allowed extension ({})", .path.display(), .allowed.join(", "))]
    ExtensionNotAllowed {
        path: PathBuf,
        allowed: Vec<String>,
    },

    #[error("'{}' is {size} bytes, limit is {limit}", .path.display())]
    TooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    #[error("{}: {}", .path.display(), .source)]
    Invalid {
        path: PathBuf,
        #[source]
        source: FsmValidationError,
    },
}

/// Reads and parses a definition file after the configured acceptance checks.
pub fn load_definition(path: &Path, upload: &UploadConfig) -> Result<FsmData, LoadError> {
    if !upload.allows(path) {
        return Err(LoadError::ExtensionNotAllowed {
            path: path.to_path_buf(),
            allowed: upload.allowed_extensions.clone(),
        });
    }

    let io_err = |source: std::io::Error| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if upload.exceeds_limit(size) {
        return Err(LoadError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: upload.max_bytes,
        });
    }

    let text = std::fs::read_to_string(path).map_err(io_err)?;
    let fsm = FsmData::parse(&text).map_err(|source| LoadError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        "Loaded FSM '{}' from {} (checksum {})",
        fsm.name(),
        path.display(),
        fsm.checksum()
    );
    Ok(fsm)
}

/// Executes a one-shot command and returns the formatted output.
pub fn execute(cmd: Commands, config: &Config) -> Result<String, Box<dyn std::error::Error>> {
    let format = config.output.format;

    match cmd {
        Commands::Repl { .. } => unreachable!(),

        Commands::Check { file } => {
            let fsm = load_definition(&file, &config.upload)?;
            Ok(format_check(&fsm, format))
        }

        Commands::Show { file } => {
            let fsm = load_definition(&file, &config.upload)?;
            Ok(format_model(&fsm, format))
        }

        Commands::Run { file, input } => {
            let fsm = load_definition(&file, &config.upload)?;
            let result = Simulator::new(&fsm).run(&input);
            format_run(&result, format)
        }

        Commands::Steps { file, input } => {
            let fsm = load_definition(&file, &config.upload)?;
            let result = Simulator::new(&fsm).enumerate(&input);
            format_steps(&result, format)
        }

        Commands::Batch { file, inputs } => {
            let fsm = load_definition(&file, &config.upload)?;
            let text = std::fs::read_to_string(&inputs)
                .map_err(|e| format!("failed to read '{}': {}", inputs.display(), e))?;
            let rows = run_batch(&fsm, read_inputs(&text));
            format_batch(&rows, format)
        }

        Commands::Config { output } => match output {
            Some(path) => {
                config.save(&path)?;
                Ok(format!("{} config to {}", "Wrote".green(), path.display()))
            }
            None => Ok(config.to_yaml()?),
        },
    }
}

/// Non-empty trimmed lines of a batch inputs file.
pub fn read_inputs(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn numbering(fsm: &FsmData) -> &'static str {
    if fsm.zero_indexed() {
        "0-based"
    } else {
        "1-based"
    }
}

pub fn format_check(fsm: &FsmData, format: OutputFormat) -> String {
    let undeclared = fsm.undeclared_symbols();

    if format == OutputFormat::Json {
        return format_json(&serde_json::json!({
            "valid": true,
            "name": fsm.name(),
            "checksum": fsm.checksum(),
            "zeroIndexed": fsm.zero_indexed(),
            "undeclaredSymbols": undeclared,
        }));
    }

    let mut output = format!(
        "{} {}: {} states, {} symbols, {}, checksum {}",
        "OK".green(),
        fsm.name().cyan(),
        fsm.states(),
        fsm.symbols().len(),
        numbering(fsm),
        fsm.checksum()
    );
    for symbol in undeclared {
        output.push_str(&format!(
            "\n{}: symbol '{}' is not declared in symbols",
            "Warning".yellow(),
            symbol
        ));
    }
    output
}

pub fn format_model(fsm: &FsmData, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return format_json(&fsm.to_json());
    }

    let mut output = format!(
        "{}\n  states: {} ({}, {})\n  symbols: {{{}}}\n  start: {}  accept: {}\n  checksum: {}\n",
        format!("FSM {}", fsm.name().cyan()).bold(),
        fsm.states(),
        numbering(fsm),
        fsm.indexing().describe_range(fsm.states()),
        fsm.symbols().join(", "),
        fsm.startstate().to_string().yellow(),
        fsm.acceptstate().to_string().green(),
        fsm.checksum()
    );
    for (state, entries) in fsm.transitions() {
        let moves: Vec<String> = entries
            .iter()
            .map(|(symbol, target)| format!("'{}' -> {}", symbol, target))
            .collect();
        output.push_str(&format!("  {:>3}: {}\n", state, moves.join(", ")));
    }
    output.truncate(output.trim_end().len());
    output
}

pub fn format_run(
    result: &RunResult,
    format: OutputFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    if format == OutputFormat::Json {
        return Ok(format_json(&serde_json::to_value(result)?));
    }

    let verdict = if result.accepted {
        "ACCEPTED".green().bold()
    } else {
        "REJECTED".red().bold()
    };
    let mut output = format!(
        "{} (end state {})\n  {}",
        verdict,
        result.end_state,
        result.trace()
    );
    if let Some(error) = &result.error {
        output.push_str(&format!("\n  {}", error.yellow()));
    }
    Ok(output)
}

pub fn format_steps(
    result: &Enumeration,
    format: OutputFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    if format == OutputFormat::Json {
        return Ok(format_json(&serde_json::to_value(result)?));
    }
    if result.is_empty() {
        return Ok("No steps (empty input)".yellow().to_string());
    }

    let width = result
        .steps
        .iter()
        .map(|step| step.symbol.chars().count())
        .max()
        .unwrap_or(1)
        .max(6);

    let mut output = format!("{:>4}  {:<width$}  {}\n", "pos", "symbol", "transitions");
    for step in &result.steps {
        let moves: Vec<String> = step
            .states
            .iter()
            .map(|entry| match entry.next_state {
                Some(next) => format!("{} -> {}", entry.current_state, next),
                None => format!("{} -> {}", entry.current_state, "-".dimmed()),
            })
            .collect();
        let marker = if step.is_anchor { "*" } else { " " };
        output.push_str(&format!(
            "{:>3}{}  {:<width$}  {}\n",
            step.position,
            marker,
            step.symbol,
            moves.join(", ")
        ));
    }
    output.push_str(&"* anchor: start state only".dimmed().to_string());
    Ok(output)
}

pub fn format_batch(
    rows: &[ExperimentRow],
    format: OutputFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let summary = ExperimentSummary::from_rows(rows);

    let mut lines = Vec::with_capacity(rows.len() + 1);
    if format == OutputFormat::Json {
        for row in rows {
            lines.push(serde_json::to_string(row)?);
        }
        let totals = serde_json::json!({ "summary": summary });
        lines.push(serde_json::to_string(&totals)?);
        return Ok(lines.join("\n"));
    }

    for row in rows {
        let verdict = if row.accepted() {
            "accept".green()
        } else if row.run.error.is_some() {
            "stuck ".yellow()
        } else {
            "reject".red()
        };
        lines.push(format!(
            "{}  {:<16}  {}  ({} distractors)",
            verdict,
            row.input,
            row.run.trace(),
            row.distractors().count()
        ));
    }
    lines.push(format!(
        "{} inputs: {} accepted, {} rejected ({} stuck)",
        summary.total,
        summary.accepted.to_string().green(),
        summary.rejected.to_string().red(),
        summary.stuck
    ));
    Ok(lines.join("\n"))
}

fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
