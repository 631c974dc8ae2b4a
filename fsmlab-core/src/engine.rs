//! Execution engine - replays input against a parsed FSM.

use crate::definition::{FsmData, StateId};
use crate::steps::{self, Enumeration};
use serde::Serialize;
use std::collections::HashMap;

/// One entry in a run's path. The seed entry has no symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathStep {
    pub state: StateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Result of running an input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub accepted: bool,
    pub path: Vec<PathStep>,
    /// State reached, or the state before the step that had no transition.
    pub end_state: StateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    /// Visited states in order, starting with the start state.
    pub fn states(&self) -> Vec<StateId> {
        self.path.iter().map(|step| step.state).collect()
    }

    /// Renders the path as `1 -0-> 1 -1-> 2`.
    pub fn trace(&self) -> String {
        let mut out = String::new();
        for step in &self.path {
            match &step.symbol {
                Some(symbol) => out.push_str(&format!(" -{}-> {}", symbol, step.state)),
                None => out.push_str(&step.state.to_string()),
            }
        }
        out
    }
}

/// `(source, symbol) -> target` lookup flattened from an FSM's transitions.
///
/// When a row lists a symbol twice, the first entry wins.
#[derive(Debug, Clone)]
pub struct TransitionTable<'a> {
    table: HashMap<StateId, HashMap<&'a str, StateId>>,
}

impl<'a> TransitionTable<'a> {
    pub fn new(fsm: &'a FsmData) -> Self {
        let mut table: HashMap<StateId, HashMap<&'a str, StateId>> = HashMap::new();
        for (source, entries) in fsm.transitions() {
            let row = table.entry(*source).or_default();
            for (symbol, target) in entries {
                row.entry(symbol.as_str()).or_insert(*target);
            }
        }
        Self { table }
    }

    pub fn get(&self, state: StateId, symbol: &str) -> Option<StateId> {
        self.table.get(&state)?.get(symbol).copied()
    }
}

/// Runs inputs against one FSM, reusing its transition table.
#[derive(Debug, Clone)]
pub struct Simulator<'a> {
    fsm: &'a FsmData,
    table: TransitionTable<'a>,
}

impl<'a> Simulator<'a> {
    pub fn new(fsm: &'a FsmData) -> Self {
        Self {
            fsm,
            table: TransitionTable::new(fsm),
        }
    }

    /// Runs `input` one character at a time.
    ///
    /// Never fails: a missing transition ends the run as a rejection with `error` set.
    pub fn run(&self, input: &str) -> RunResult {
        let mut current = self.fsm.startstate();
        let mut path = vec![PathStep {
            state: current,
            symbol: None,
        }];

        for (offset, c) in input.char_indices() {
            let symbol = &input[offset..offset + c.len_utf8()];
            match self.table.get(current, symbol) {
                Some(next) => {
                    path.push(PathStep {
                        state: next,
                        symbol: Some(symbol.to_string()),
                    });
                    current = next;
                }
                None => {
                    tracing::debug!(
                        "No transition for '{}' from state {} in FSM '{}'",
                        symbol,
                        current,
                        self.fsm.name()
                    );
                    return RunResult {
                        accepted: false,
                        path,
                        end_state: current,
                        error: Some(format!(
                            "No transition for symbol '{}' from state {}",
                            symbol, current
                        )),
                    };
                }
            }
        }

        RunResult {
            accepted: current == self.fsm.acceptstate(),
            path,
            end_state: current,
            error: None,
        }
    }

    /// Enumerates competing transitions for `input`. See [`crate::steps`].
    pub fn enumerate(&self, input: &str) -> Enumeration {
        steps::enumerate_with(self.fsm, &self.table, input)
    }
}

/// Runs `input` against `fsm`.
pub fn run(fsm: &FsmData, input: &str) -> RunResult {
    Simulator::new(fsm).run(input)
}
