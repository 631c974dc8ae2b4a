//! # fsmlab-core
//!
//! Finite-state machine engine for fsmlab.
//!
//! This crate provides:
//! - Definition parsing (two transition-row dialects)
//! - State numbering normalization and validation
//! - Deterministic execution of inputs
//! - Competing-transition enumeration and experiment rows
//!
//! Everything here is a pure function over its inputs: no I/O, no shared state.

pub mod definition;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod indexing;
pub mod parser;
pub mod steps;

pub use definition::{FsmData, RawDefinition, SourceRow, StateId, TransitionMap};
pub use engine::{run, PathStep, RunResult, Simulator, TransitionTable};
pub use error::{ErrorKind, FsmValidationError};
pub use experiment::{run_batch, CompetingTile, ExperimentRow, ExperimentSummary};
pub use indexing::{Indexing, Scheme};
pub use parser::parse;
pub use steps::{enumerate, CompetingTransition, Enumeration, Step};
