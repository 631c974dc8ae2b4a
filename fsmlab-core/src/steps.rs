//! Step and competing-transition enumeration.
//!
//! Where [`crate::engine`] follows the single path an input actually takes, the
//! enumerator reports, for every input position, what each state would do with
//! that position's symbol. The input is cut into fixed-size chunks whose length is
//! [`FsmData::chunk_size`]; a trailing chunk shorter than that is kept as is.
//!
//! Position 0 is the anchor and only evaluates the start state. Later positions
//! sweep states `1..=states`. The sweep is 1-based even when the model is
//! 0-based, so state 0 is never listed and the last listed state has no row; the
//! behavior is kept as is until downstream consumers agree on a change.

use crate::definition::{FsmData, StateId};
use crate::engine::TransitionTable;
use serde::Serialize;

/// What one state does with a position's symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetingTransition {
    pub current_state: StateId,
    pub next_state: Option<StateId>,
    /// Symbol at the following position, `None` at the last one.
    pub upcoming_input: Option<String>,
}

/// One input position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub position: usize,
    pub symbol: String,
    pub is_anchor: bool,
    pub states: Vec<CompetingTransition>,
}

/// Result of [`enumerate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Enumeration {
    pub steps: Vec<Step>,
}

impl Enumeration {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Splits `input` into consecutive chunks of `size` characters. The last chunk
/// may be shorter.
pub fn chunk(input: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in input.char_indices() {
        if count == size {
            chunks.push(&input[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        chunks.push(&input[start..]);
    }

    chunks
}

/// Enumerates every competing transition for `input`.
pub fn enumerate(fsm: &FsmData, input: &str) -> Enumeration {
    enumerate_with(fsm, &TransitionTable::new(fsm), input)
}

pub(crate) fn enumerate_with(
    fsm: &FsmData,
    table: &TransitionTable<'_>,
    input: &str,
) -> Enumeration {
    let chunks = chunk(input, fsm.chunk_size());

    let steps = chunks
        .iter()
        .enumerate()
        .map(|(position, symbol)| {
            let upcoming = chunks.get(position + 1).map(|s| s.to_string());
            let competing = |state: StateId| CompetingTransition {
                current_state: state,
                next_state: table.get(state, symbol),
                upcoming_input: upcoming.clone(),
            };

            let states = if position == 0 {
                vec![competing(fsm.startstate())]
            } else {
                (1..=fsm.states()).map(competing).collect()
            };

            Step {
                position,
                symbol: symbol.to_string(),
                is_anchor: position == 0,
                states,
            }
        })
        .collect();

    Enumeration { steps }
}
