//! Interactive REPL.

use crate::commands::{format_check, format_model, format_run, format_steps, load_definition};
use crate::config::Config;
use colored::Colorize;
use fsmlab_core::{FsmData, Simulator};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::path::PathBuf;

const HELP_TEXT: &str = r#"
Available commands:
  help                  Show this help

  load <file>           Load and validate a definition file
  check                 Re-read the loaded file and validate it
  show                  Show the loaded model

  run [input]           Run an input (empty input if omitted)
  steps [input]         Enumerate competing transitions for an input

  quit, exit            Exit the REPL
"#;

/// REPL state: the loaded model and where it came from.
struct Session<'a> {
    config: &'a Config,
    fsm: Option<FsmData>,
    source: Option<PathBuf>,
}

impl<'a> Session<'a> {
    fn new(config: &'a Config) -> Self {
        Self {
            config,
            fsm: None,
            source: None,
        }
    }

    fn load(&mut self, path: PathBuf) -> Result<String, Box<dyn std::error::Error>> {
        let fsm = load_definition(&path, &self.config.upload)?;
        let summary = format_check(&fsm, self.config.output.format);
        self.fsm = Some(fsm);
        self.source = Some(path);
        Ok(summary)
    }

    fn model(&self) -> Result<&FsmData, Box<dyn std::error::Error>> {
        self.fsm
            .as_ref()
            .ok_or_else(|| "no definition loaded (use 'load <file>')".into())
    }

    fn prompt(&self) -> String {
        match &self.fsm {
            Some(fsm) => format!("{} ", format!("fsmlab[{}]>", fsm.name()).cyan()),
            None => format!("{} ", "fsmlab>".cyan()),
        }
    }
}

pub fn run(config: &Config, file: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "fsmlab".bold().cyan());

    let mut session = Session::new(config);
    if let Some(path) = file {
        match session.load(path) {
            Ok(summary) => println!("{}", summary),
            Err(e) => println!("{}: {}", "Error".red(), e),
        }
    }

    // Create readline editor
    let rl_config = rustyline::Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(rl_config)?;

    let history_path = config.repl.history_path();
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    loop {
        match rl.readline(&session.prompt()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute_repl_command(&mut session, line) {
                    Ok(Some(output)) => println!("{}\n", output),
                    Ok(None) => break, // Exit command
                    Err(e) => println!("{}: {}\n", "Error".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&history_path) {
        tracing::debug!(
            "Could not save history to {}: {}",
            history_path.display(),
            e
        );
    }

    Ok(())
}

fn execute_repl_command(
    session: &mut Session<'_>,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };
    let cmd = cmd.to_lowercase();
    let format = session.config.output.format;

    match cmd.as_str() {
        "help" | "?" => Ok(Some(HELP_TEXT.to_string())),

        "quit" | "exit" | "q" => Ok(None),

        "load" | "l" => {
            if rest.is_empty() {
                return Ok(Some("Usage: load <file>".to_string()));
            }
            session.load(PathBuf::from(rest)).map(Some)
        }

        "check" => match session.source.clone() {
            Some(path) => session.load(path).map(Some),
            None => Ok(Some("Nothing loaded".yellow().to_string())),
        },

        "show" => Ok(Some(format_model(session.model()?, format))),

        "run" | "r" => {
            let result = Simulator::new(session.model()?).run(rest);
            format_run(&result, format).map(Some)
        }

        "steps" | "s" => {
            let result = Simulator::new(session.model()?).enumerate(rest);
            format_steps(&result, format).map(Some)
        }

        _ => Ok(Some(format!("Unknown command: {}. Type 'help' for help.", cmd))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MOD4: &str = r#"Name = "mod4"
states = 4
symbols = {0, 1}
transitions =
1: 0.1, 1.2
2: 0.3, 1.4
3: 0.1, 1.2
4: 0.3, 1.4
startstate = 1
acceptstate = 1
"#;

    fn definition_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".fsm").tempfile().unwrap();
        file.write_all(MOD4.as_bytes()).unwrap();
        file
    }

    fn output(session: &mut Session<'_>, line: &str) -> String {
        execute_repl_command(session, line).unwrap().unwrap()
    }

    #[test]
    fn test_help_and_quit() {
        let config = Config::default();
        let mut session = Session::new(&config);
        assert!(output(&mut session, "help").contains("load <file>"));
        assert!(execute_repl_command(&mut session, "QUIT").unwrap().is_none());
        assert!(execute_repl_command(&mut session, "exit").unwrap().is_none());
    }

    #[test]
    fn test_requires_loaded_model() {
        let config = Config::default();
        let mut session = Session::new(&config);
        let err = execute_repl_command(&mut session, "run 01").unwrap_err();
        assert!(err.to_string().contains("no definition loaded"));
        assert!(output(&mut session, "check").contains("Nothing loaded"));
    }

    #[test]
    fn test_load_then_run() {
        let config = Config::default();
        let file = definition_file();
        let mut session = Session::new(&config);

        let loaded = output(&mut session, &format!("load {}", file.path().display()));
        assert!(loaded.contains("OK"));
        assert!(session.prompt().contains("fsmlab[mod4]>"));

        assert!(output(&mut session, "run 100").contains("ACCEPTED"));
        assert!(output(&mut session, "run 1001").contains("REJECTED"));
        assert!(output(&mut session, "run").contains("ACCEPTED"));
        assert!(output(&mut session, "show").contains("mod4"));
        assert_eq!(output(&mut session, "steps 10").lines().count(), 4);
        assert!(output(&mut session, "check").contains("OK"));
    }

    #[test]
    fn test_failed_load_keeps_previous_model() {
        let config = Config::default();
        let file = definition_file();
        let mut session = Session::new(&config);
        output(&mut session, &format!("load {}", file.path().display()));

        assert!(execute_repl_command(&mut session, "load /nonexistent/model.fsm").is_err());
        assert_eq!(session.model().unwrap().name(), "mod4");
    }

    #[test]
    fn test_usage_and_unknown() {
        let config = Config::default();
        let mut session = Session::new(&config);
        assert!(output(&mut session, "load").starts_with("Usage"));
        assert!(output(&mut session, "frobnicate").contains("Unknown command: frobnicate"));
    }
}
