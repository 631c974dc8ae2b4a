//! FSM definition types.
//!
//! Definitions are authored as line-oriented text:
//!
//! ```text
//! Name = "divby4fsm"
//! states = 4
//! symbols = {0, 1}
//! transitions =   1: on '0' Move '1', on '1' Move '1'
//!         2: on '0' move '2', on '1' Move '3'
//!         3. On '0' move '1', on '1' move '1'
//!         4. On '0' move '2', on '1' move '3'
//! startstate = 1
//! acceptstate = 1
//! ```
//!
//! [`crate::parser`] turns the text into a [`RawDefinition`];
//! [`FsmData::from_raw`] normalizes its numbering and validates it.

use crate::error::{ErrorKind, FsmValidationError};
use crate::indexing::{self, Indexing};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Numeric state identifier.
pub type StateId = u32;

/// One `(symbol, target)` pair in a transition row.
pub type TransitionEntry = (String, StateId);

/// Transition rows keyed by source state, entries in authored order.
pub type TransitionMap = BTreeMap<StateId, Vec<TransitionEntry>>;

/// A transition row as read from the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 1-based line the row was read from (0 if synthesized).
    pub line: usize,
    pub entries: Vec<TransitionEntry>,
}

impl SourceRow {
    pub fn new(line: usize, entries: Vec<TransitionEntry>) -> Self {
        Self { line, entries }
    }
}

/// Everything the parser collected, before numbering is normalized.
#[derive(Debug, Clone, Default)]
pub struct RawDefinition {
    pub name: Option<String>,
    pub states: Option<u32>,
    pub symbols: Option<Vec<String>>,
    pub transitions_declared: bool,
    pub rows: BTreeMap<StateId, SourceRow>,
    pub startstate: Option<StateId>,
    pub acceptstate: Option<StateId>,
}

impl RawDefinition {
    /// Keywords whose declaration was never seen, in canonical order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.states.is_none() {
            missing.push("states");
        }
        if self.symbols.is_none() {
            missing.push("symbols");
        }
        if !self.transitions_declared {
            missing.push("transitions");
        }
        if self.startstate.is_none() {
            missing.push("startstate");
        }
        if self.acceptstate.is_none() {
            missing.push("acceptstate");
        }
        missing
    }
}

pub(crate) fn missing_fields_error(missing: &[&str]) -> FsmValidationError {
    FsmValidationError::document(
        ErrorKind::MissingFields,
        format!("Missing required fields: {}", missing.join(", ")),
    )
}

/// Validated, canonically numbered finite-state machine.
///
/// Immutable once built; [`crate::engine`] and [`crate::steps`] only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FsmData {
    name: String,
    states: u32,
    symbols: Vec<String>,
    transitions: TransitionMap,
    startstate: StateId,
    acceptstate: StateId,
    #[serde(rename = "zeroIndexed", serialize_with = "serialize_zero_indexed")]
    indexing: Indexing,
    /// CRC32C of the canonical content, for spotting identical uploads.
    checksum: String,
}

fn serialize_zero_indexed<S>(indexing: &Indexing, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_bool(indexing.is_zero_based())
}

impl FsmData {
    /// Parses and validates a definition from text.
    pub fn parse(text: &str) -> Result<Self, FsmValidationError> {
        crate::parser::parse(text)
    }

    /// Normalizes and validates parsed parts.
    pub fn from_raw(raw: RawDefinition) -> Result<Self, FsmValidationError> {
        let missing = raw.missing_fields();
        let (Some(name), Some(states), Some(symbols), Some(startstate), Some(acceptstate)) = (
            raw.name,
            raw.states,
            raw.symbols,
            raw.startstate,
            raw.acceptstate,
        ) else {
            return Err(missing_fields_error(&missing));
        };
        if !missing.is_empty() {
            return Err(missing_fields_error(&missing));
        }

        let normalized = indexing::normalize(raw.rows, states, startstate, acceptstate)?;
        let indexing = normalized.indexing;

        if normalized.rows.len() != states as usize {
            return Err(FsmValidationError::document(
                ErrorKind::CountMismatch,
                format!(
                    "Expected {} transition rows (one per state), found {}",
                    states,
                    normalized.rows.len()
                ),
            ));
        }

        if let Some(id) = indexing.range(states).find(|id| !normalized.rows.contains_key(id)) {
            return Err(FsmValidationError::document(
                ErrorKind::MissingState,
                format!(
                    "No transitions defined for state {} (expected states {})",
                    id,
                    indexing.describe_range(states)
                ),
            ));
        }

        for (field, value) in [
            ("startstate", normalized.startstate),
            ("acceptstate", normalized.acceptstate),
        ] {
            if !indexing.contains(states, value) {
                return Err(FsmValidationError::document(
                    ErrorKind::StateOutOfRange,
                    format!(
                        "{} {} is out of range {}",
                        field,
                        value,
                        indexing.describe_range(states)
                    ),
                ));
            }
        }

        for (id, row) in &normalized.rows {
            if row.entries.len() != symbols.len() {
                return Err(FsmValidationError::at(
                    row.line,
                    ErrorKind::TransitionCount,
                    format!(
                        "State {} has {} transitions, expected {} (one per symbol)",
                        id,
                        row.entries.len(),
                        symbols.len()
                    ),
                ));
            }
            if let Some((symbol, target)) = row
                .entries
                .iter()
                .find(|(_, t)| !indexing.contains(states, *t))
            {
                return Err(FsmValidationError::at(
                    row.line,
                    ErrorKind::TargetOutOfRange,
                    format!(
                        "Transition from state {} on '{}' targets state {}, out of range {}",
                        id,
                        symbol,
                        target,
                        indexing.describe_range(states)
                    ),
                ));
            }
        }

        let startstate = normalized.startstate;
        let acceptstate = normalized.acceptstate;
        let transitions: TransitionMap = normalized
            .rows
            .into_iter()
            .map(|(id, row)| (id, row.entries))
            .collect();

        let mut fsm = Self {
            name,
            states,
            symbols,
            transitions,
            startstate,
            acceptstate,
            indexing,
            checksum: String::new(),
        };
        fsm.checksum = format!("{:08x}", crc32c::crc32c(&fsm.canonical_json_bytes()));

        for symbol in fsm.undeclared_symbols() {
            tracing::warn!(
                "FSM '{}' uses symbol '{}' which is not declared in symbols",
                fsm.name,
                symbol
            );
        }

        Ok(fsm)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of states.
    pub fn states(&self) -> u32 {
        self.states
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn transitions(&self) -> &TransitionMap {
        &self.transitions
    }

    pub fn startstate(&self) -> StateId {
        self.startstate
    }

    pub fn acceptstate(&self) -> StateId {
        self.acceptstate
    }

    pub fn indexing(&self) -> Indexing {
        self.indexing
    }

    pub fn zero_indexed(&self) -> bool {
        self.indexing.is_zero_based()
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Canonical state identifiers in ascending order.
    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        self.indexing.range(self.states)
    }

    /// Looks up the target for `state` on `symbol`. The first matching entry wins.
    pub fn transition(&self, state: StateId, symbol: &str) -> Option<StateId> {
        self.transitions
            .get(&state)?
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, target)| *target)
    }

    /// Character length of one input symbol, taken from the first declared symbol.
    pub fn chunk_size(&self) -> usize {
        self.symbols
            .first()
            .map(|s| s.chars().count())
            .unwrap_or(1)
            .max(1)
    }

    /// Transition symbols that do not appear in `symbols`, deduplicated, in first-use order.
    pub fn undeclared_symbols(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for (symbol, _) in self.transitions.values().flatten() {
            if !self.symbols.iter().any(|s| s == symbol) && !seen.contains(&symbol.as_str()) {
                seen.push(symbol.as_str());
            }
        }
        seen
    }

    /// Returns the model as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("FsmData serializes to JSON")
    }

    /// Compact JSON of every field except `checksum`, keys sorted.
    fn canonical_json_bytes(&self) -> Vec<u8> {
        let mut json = self.to_json();
        if let Some(fields) = json.as_object_mut() {
            fields.remove("checksum");
        }
        json.to_string().into_bytes()
    }
}

impl FromStr for FsmData {
    type Err = FsmValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
