//! Core error types.

use thiserror::Error;

/// What went wrong while reading a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// One or more of the six required keywords never appears in the text.
    MissingFields,
    /// A line could not be read under any accepted syntax.
    Syntax,
    /// A declaration appeared more than once.
    DuplicateDeclaration,
    /// Two transition rows share a source state.
    DuplicateRow,
    /// The number of transition rows differs from `states`.
    CountMismatch,
    /// A state in the canonical range has no transition row.
    MissingState,
    /// `startstate` or `acceptstate` is outside the canonical range.
    StateOutOfRange,
    /// A row does not have one entry per declared symbol.
    TransitionCount,
    /// A transition points outside the canonical range.
    TargetOutOfRange,
}

impl ErrorKind {
    /// Returns a stable code suitable for display or machine consumption.
    pub fn error_code(&self) -> &'static str {
        match self {
            ErrorKind::MissingFields => "MISSING_FIELDS",
            ErrorKind::Syntax => "SYNTAX_ERROR",
            ErrorKind::DuplicateDeclaration => "DUPLICATE_DECLARATION",
            ErrorKind::DuplicateRow => "DUPLICATE_ROW",
            ErrorKind::CountMismatch => "COUNT_MISMATCH",
            ErrorKind::MissingState => "MISSING_STATE",
            ErrorKind::StateOutOfRange => "STATE_OUT_OF_RANGE",
            ErrorKind::TransitionCount => "TRANSITION_COUNT",
            ErrorKind::TargetOutOfRange => "TARGET_OUT_OF_RANGE",
        }
    }
}

/// A definition was rejected.
///
/// `line` is 1-based; `0` addresses the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", line_prefix(.line), .message)]
pub struct FsmValidationError {
    pub line: usize,
    pub kind: ErrorKind,
    pub message: String,
}

fn line_prefix(line: &usize) -> String {
    if *line == 0 {
        String::new()
    } else {
        format!("line {}: ", line)
    }
}

impl FsmValidationError {
    /// Error anchored to a source line.
    pub fn at(line: usize, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            message: message.into(),
        }
    }

    /// Error about the document as a whole.
    pub fn document(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::at(0, kind, message)
    }

    pub fn is_document_level(&self) -> bool {
        self.line == 0
    }

    /// Returns an error code suitable for display or machine consumption.
    pub fn error_code(&self) -> &'static str {
        self.kind.error_code()
    }
}
