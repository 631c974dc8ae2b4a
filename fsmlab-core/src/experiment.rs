//! Experiment rows.
//!
//! An experiment row pairs one input's actual run with the competing transitions
//! at each of its positions. Exporters turn rows into spreadsheets; this module
//! only builds the data.

use crate::definition::{FsmData, StateId};
use crate::engine::{RunResult, Simulator};
use crate::steps::Step;
use serde::Serialize;

/// A transition that is structurally possible at a position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetingTile {
    pub position: usize,
    pub from: StateId,
    pub symbol: String,
    pub to: StateId,
    /// Whether the actual run took this transition at this position.
    pub on_path: bool,
}

/// Run and enumeration of one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRow {
    pub input: String,
    pub run: RunResult,
    pub steps: Vec<Step>,
    pub competing_tiles: Vec<CompetingTile>,
}

impl ExperimentRow {
    pub fn build(fsm: &FsmData, input: &str) -> Self {
        Self::with_simulator(&Simulator::new(fsm), input)
    }

    fn with_simulator(sim: &Simulator<'_>, input: &str) -> Self {
        let run = sim.run(input);
        let steps = sim.enumerate(input).steps;
        let competing_tiles = tiles(&run, &steps);
        Self {
            input: input.to_string(),
            run,
            steps,
            competing_tiles,
        }
    }

    pub fn accepted(&self) -> bool {
        self.run.accepted
    }

    /// Tiles the run did not take.
    pub fn distractors(&self) -> impl Iterator<Item = &CompetingTile> {
        self.competing_tiles.iter().filter(|tile| !tile.on_path)
    }
}

/// Flattens defined step entries into tiles, in step then state order.
///
/// A tile is on the path when the run moved `from -> to` on the same symbol at the
/// same position. Runs consume one character per step, so with multi-character
/// symbols no tile is ever on the path.
fn tiles(run: &RunResult, steps: &[Step]) -> Vec<CompetingTile> {
    steps
        .iter()
        .flat_map(|step| {
            step.states.iter().filter_map(move |entry| {
                let to = entry.next_state?;
                let before = run.path.get(step.position);
                let after = run.path.get(step.position + 1);
                let on_path = match (before, after) {
                    (Some(before), Some(after)) => {
                        before.state == entry.current_state
                            && after.state == to
                            && after.symbol.as_deref() == Some(step.symbol.as_str())
                    }
                    _ => false,
                };
                Some(CompetingTile {
                    position: step.position,
                    from: entry.current_state,
                    symbol: step.symbol.clone(),
                    to,
                    on_path,
                })
            })
        })
        .collect()
}

/// Builds one row per input, in order.
pub fn run_batch<I, S>(fsm: &FsmData, inputs: I) -> Vec<ExperimentRow>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sim = Simulator::new(fsm);
    inputs
        .into_iter()
        .map(|input| ExperimentRow::with_simulator(&sim, input.as_ref()))
        .collect()
}

/// Totals across a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExperimentSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Rejections caused by a missing transition rather than the end state.
    pub stuck: usize,
}

impl ExperimentSummary {
    pub fn from_rows(rows: &[ExperimentRow]) -> Self {
        rows.iter().fold(Self::default(), |mut summary, row| {
            summary.total += 1;
            if row.accepted() {
                summary.accepted += 1;
            } else {
                summary.rejected += 1;
                if row.run.error.is_some() {
                    summary.stuck += 1;
                }
            }
            summary
        })
    }
}
