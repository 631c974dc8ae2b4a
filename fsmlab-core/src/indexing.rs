//! State numbering schemes.
//!
//! Definitions in the wild number their states three ways:
//!
//! - 0-based: rows `0..N-1`, targets `0..N-1`.
//! - 1-based: rows `1..N`, targets `1..N`.
//! - shifted: rows labeled `1..N` but targets written `0..N-1`.
//!
//! [`normalize`] resolves the scheme once, rewriting shifted definitions to 0-based,
//! so everything downstream sees one consistent numbering.

use crate::definition::{SourceRow, StateId};
use crate::error::{ErrorKind, FsmValidationError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

/// Canonical numbering of an FSM's states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indexing {
    /// States are `0..states-1`.
    ZeroBased,
    /// States are `1..states`.
    OneBased,
}

impl Indexing {
    pub fn is_zero_based(self) -> bool {
        self == Indexing::ZeroBased
    }

    /// The lowest valid state identifier.
    pub fn first(self) -> StateId {
        match self {
            Indexing::ZeroBased => 0,
            Indexing::OneBased => 1,
        }
    }

    /// Valid state identifiers for a machine with `states` states.
    pub fn range(self, states: u32) -> Range<StateId> {
        let first = self.first();
        first..first.saturating_add(states)
    }

    pub fn contains(self, states: u32, id: StateId) -> bool {
        self.range(states).contains(&id)
    }

    /// Inclusive range as shown to authors, e.g. `1..4`.
    pub fn describe_range(self, states: u32) -> String {
        let range = self.range(states);
        format!("{}..{}", range.start, range.end.saturating_sub(1))
    }
}

/// How a definition's numbering was authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// A row is labeled `0`.
    ZeroBased,
    /// Rows span `1..N` while targets span `0..N-1`.
    Shifted,
    /// Anything else.
    OneBased,
}

impl Scheme {
    /// The canonical numbering the scheme normalizes to.
    pub fn indexing(self) -> Indexing {
        match self {
            Scheme::ZeroBased | Scheme::Shifted => Indexing::ZeroBased,
            Scheme::OneBased => Indexing::OneBased,
        }
    }
}

/// Result of [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub scheme: Scheme,
    pub indexing: Indexing,
    pub rows: BTreeMap<StateId, SourceRow>,
    pub startstate: StateId,
    pub acceptstate: StateId,
}

/// Detects the authored numbering scheme from row labels and targets.
pub fn detect(rows: &BTreeMap<StateId, SourceRow>, states: u32) -> Scheme {
    if rows.contains_key(&0) {
        return Scheme::ZeroBased;
    }

    let (Some(min_row), Some(max_row)) = (rows.keys().next(), rows.keys().next_back()) else {
        return Scheme::OneBased;
    };

    let mut targets = rows
        .values()
        .flat_map(|row| row.entries.iter().map(|(_, target)| *target));
    let Some(first_target) = targets.next() else {
        return Scheme::OneBased;
    };
    let (min_target, max_target) = targets.fold((first_target, first_target), |(lo, hi), t| {
        (lo.min(t), hi.max(t))
    });

    if *min_row == 1 && *max_row == states && min_target == 0 && max_target == states - 1 {
        Scheme::Shifted
    } else {
        Scheme::OneBased
    }
}

/// Resolves the numbering scheme and rewrites shifted definitions to 0-based.
///
/// Runs once per definition, after every row is parsed and before validation.
/// Already-canonical input comes back unchanged.
pub fn normalize(
    rows: BTreeMap<StateId, SourceRow>,
    states: u32,
    startstate: StateId,
    acceptstate: StateId,
) -> Result<Normalized, FsmValidationError> {
    let scheme = detect(&rows, states);
    tracing::debug!("Detected {:?} state numbering", scheme);

    if scheme != Scheme::Shifted {
        return Ok(Normalized {
            scheme,
            indexing: scheme.indexing(),
            rows,
            startstate,
            acceptstate,
        });
    }

    let shift = |field: &str, value: StateId| {
        value.checked_sub(1).ok_or_else(|| {
            FsmValidationError::document(
                ErrorKind::StateOutOfRange,
                format!(
                    "{} {} is out of range {}",
                    field,
                    value,
                    Indexing::OneBased.describe_range(states)
                ),
            )
        })
    };
    let startstate = shift("startstate", startstate)?;
    let acceptstate = shift("acceptstate", acceptstate)?;

    // Shifted rows are labeled 1..N, so every key is at least 1.
    let rows = rows.into_iter().map(|(id, row)| (id - 1, row)).collect();

    Ok(Normalized {
        scheme,
        indexing: Indexing::ZeroBased,
        rows,
        startstate,
        acceptstate,
    })
}
