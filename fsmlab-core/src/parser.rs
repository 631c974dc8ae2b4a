//! Definition text parser.
//!
//! The format is line-oriented. Each declaration starts with a case-insensitive
//! keyword followed by `=`:
//!
//! - `Name = "<string>"` (single or double quotes)
//! - `states = <integer>` (digits may be quoted)
//! - `symbols = {<token>, <token>, ...}`
//! - `startstate = <integer>` / `acceptstate = <integer>`
//! - `transitions =` followed by one row per state
//!
//! A transitions block runs until the next keyword line or end of input, and its
//! first row may sit on the `transitions =` line itself. Each row starts with a
//! state number and is read in one of two dialects, tried in order:
//!
//! 1. natural language: `on '0' move '2', on '1' move '3'` (any word starting
//!    with `m` is accepted, as is a stray period after the symbol)
//! 2. legacy dotted: `0.2, 1.3`

use crate::definition::{
    missing_fields_error, FsmData, RawDefinition, SourceRow, StateId, TransitionEntry,
};
use crate::error::{ErrorKind, FsmValidationError};
use regex::Regex;
use std::sync::LazyLock;

static ROW_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*[:.]?\s*(.*)$").expect("row label pattern"));

static NATURAL_TRANSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bon\s+['"]([^'"]+)['"]\s*\.?\s*m\w*\s*['"](\d+)['"]"#)
        .expect("natural transition pattern")
});

/// Declaration keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Name,
    States,
    Symbols,
    Transitions,
    StartState,
    AcceptState,
}

impl Keyword {
    pub const ALL: [Keyword; 6] = [
        Keyword::Name,
        Keyword::States,
        Keyword::Symbols,
        Keyword::Transitions,
        Keyword::StartState,
        Keyword::AcceptState,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Name => "name",
            Keyword::States => "states",
            Keyword::Symbols => "symbols",
            Keyword::Transitions => "transitions",
            Keyword::StartState => "startstate",
            Keyword::AcceptState => "acceptstate",
        }
    }

    /// Matches a keyword at the start of `line`, returning the text after it.
    fn strip_from(line: &str) -> Option<(Keyword, &str)> {
        Self::ALL.into_iter().find_map(|keyword| {
            let word = keyword.as_str();
            let head = line.get(..word.len())?;
            if !head.eq_ignore_ascii_case(word) {
                return None;
            }
            let rest = &line[word.len()..];
            match rest.chars().next() {
                Some(c) if c.is_alphanumeric() || c == '_' => None,
                _ => Some((keyword, rest)),
            }
        })
    }
}

/// Parses and validates a definition.
///
/// # Errors
/// Returns [`FsmValidationError`] with the 1-based line of the offending text, or
/// line 0 when the problem concerns the document as a whole.
pub fn parse(text: &str) -> Result<FsmData, FsmValidationError> {
    check_required_fields(text)?;

    let mut state = ParseState::default();
    for (index, line) in text.lines().enumerate() {
        state.feed(index + 1, line)?;
    }

    let fsm = FsmData::from_raw(state.finish())?;
    tracing::debug!(
        "Parsed FSM '{}' ({} states, {} symbols, {:?})",
        fsm.name(),
        fsm.states(),
        fsm.symbols().len(),
        fsm.indexing()
    );
    Ok(fsm)
}

/// Fails unless every keyword occurs somewhere in the text, ignoring case.
pub fn check_required_fields(text: &str) -> Result<(), FsmValidationError> {
    let folded = text.to_lowercase();
    let missing: Vec<&str> = Keyword::ALL
        .iter()
        .map(|k| k.as_str())
        .filter(|k| !folded.contains(k))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing_fields_error(&missing))
    }
}

/// Bookkeeping for a single [`parse`] call.
#[derive(Debug, Default)]
struct ParseState {
    raw: RawDefinition,
    in_transitions: bool,
}

impl ParseState {
    fn feed(&mut self, line_no: usize, line: &str) -> Result<(), FsmValidationError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        if let Some((keyword, rest)) = Keyword::strip_from(line) {
            self.in_transitions = false;
            let value = rest.trim_start().strip_prefix('=').ok_or_else(|| {
                syntax(
                    line_no,
                    format!("Expected '=' after '{}'", keyword.as_str()),
                )
            })?;
            return self.declare(line_no, keyword, value.trim());
        }

        if self.in_transitions {
            return self.add_row(line_no, line);
        }

        Err(syntax(
            line_no,
            format!("Unexpected line outside a declaration: '{}'", line),
        ))
    }

    fn declare(
        &mut self,
        line_no: usize,
        keyword: Keyword,
        value: &str,
    ) -> Result<(), FsmValidationError> {
        let already_declared = match keyword {
            Keyword::Name => self.raw.name.is_some(),
            Keyword::States => self.raw.states.is_some(),
            Keyword::Symbols => self.raw.symbols.is_some(),
            Keyword::Transitions => self.raw.transitions_declared,
            Keyword::StartState => self.raw.startstate.is_some(),
            Keyword::AcceptState => self.raw.acceptstate.is_some(),
        };
        if already_declared {
            return Err(FsmValidationError::at(
                line_no,
                ErrorKind::DuplicateDeclaration,
                format!("'{}' is declared more than once", keyword.as_str()),
            ));
        }

        match keyword {
            Keyword::Name => {
                let name = unquote(value)
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| syntax(line_no, "Name must be a non-empty quoted string"))?;
                self.raw.name = Some(name.to_string());
            }
            Keyword::States => {
                let states = parse_integer(line_no, keyword, value)?;
                if states == 0 {
                    return Err(syntax(line_no, "states must be a positive integer"));
                }
                self.raw.states = Some(states);
            }
            Keyword::Symbols => {
                self.raw.symbols = Some(parse_symbols(line_no, value)?);
            }
            Keyword::StartState => {
                self.raw.startstate = Some(parse_integer(line_no, keyword, value)?);
            }
            Keyword::AcceptState => {
                self.raw.acceptstate = Some(parse_integer(line_no, keyword, value)?);
            }
            Keyword::Transitions => {
                self.raw.transitions_declared = true;
                self.in_transitions = true;
                if !value.is_empty() {
                    self.add_row(line_no, value)?;
                }
            }
        }

        Ok(())
    }

    fn add_row(&mut self, line_no: usize, text: &str) -> Result<(), FsmValidationError> {
        let (id, entries) = parse_row(line_no, text)?;
        if self.raw.rows.contains_key(&id) {
            return Err(FsmValidationError::at(
                line_no,
                ErrorKind::DuplicateRow,
                format!("Duplicate transitions row for state {}", id),
            ));
        }
        self.raw.rows.insert(id, SourceRow::new(line_no, entries));
        Ok(())
    }

    fn finish(self) -> RawDefinition {
        self.raw
    }
}

/// A row syntax: yields the row's transitions, or `None` if the text is not in this dialect.
type Dialect = fn(&str) -> Option<Vec<TransitionEntry>>;

const DIALECTS: [(&str, Dialect); 2] = [
    ("natural-language", parse_natural),
    ("dotted", parse_dotted),
];

/// Parses one transition row: a state number followed by its transitions.
pub fn parse_row(
    line_no: usize,
    text: &str,
) -> Result<(StateId, Vec<TransitionEntry>), FsmValidationError> {
    let captures = ROW_LABEL
        .captures(text.trim())
        .ok_or_else(|| syntax(line_no, "Transition row must start with a state number"))?;
    let id: StateId = captures[1]
        .parse()
        .map_err(|_| {
            syntax(
                line_no,
                format!("State number '{}' is too large", &captures[1]),
            )
        })?;
    let body = captures.get(2).map_or("", |m| m.as_str());

    DIALECTS
        .iter()
        .find_map(|(dialect, parse)| {
            let entries = parse(body)?;
            tracing::debug!("Line {}: read state {} as {} row", line_no, id, dialect);
            Some((id, entries))
        })
        .ok_or_else(|| {
            syntax(
                line_no,
                format!("Could not read any transitions for state {}", id),
            )
        })
}

/// `on '<symbol>' move '<target>'`, repeated.
fn parse_natural(body: &str) -> Option<Vec<TransitionEntry>> {
    NATURAL_TRANSITION
        .captures_iter(body)
        .map(|c| Some((c[1].to_string(), c[2].parse().ok()?)))
        .collect::<Option<Vec<_>>>()
        .filter(|entries| !entries.is_empty())
}

/// `<symbol>.<target>, <symbol>.<target>`, optionally wrapped in braces.
fn parse_dotted(body: &str) -> Option<Vec<TransitionEntry>> {
    let body = body.trim();
    let body = body
        .strip_prefix('{')
        .and_then(|b| b.strip_suffix('}'))
        .unwrap_or(body);

    body.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            let (symbol, target) = token.split_once('.')?;
            if !is_digits(symbol) || !is_digits(target) {
                return None;
            }
            Some((symbol.to_string(), target.parse().ok()?))
        })
        .collect::<Option<Vec<_>>>()
        .filter(|entries| !entries.is_empty())
}

fn parse_symbols(line_no: usize, value: &str) -> Result<Vec<String>, FsmValidationError> {
    let inner = value
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .ok_or_else(|| {
            syntax(
                line_no,
                "symbols must be a brace-enclosed list, e.g. {0, 1}",
            )
        })?;

    let symbols: Vec<String> = inner
        .split(',')
        .map(str::trim)
        .map(|token| unquote(token).unwrap_or(token))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();

    if symbols.is_empty() {
        return Err(syntax(line_no, "symbols must declare at least one symbol"));
    }
    Ok(symbols)
}

fn parse_integer(line_no: usize, keyword: Keyword, value: &str) -> Result<u32, FsmValidationError> {
    let digits = unquote(value).unwrap_or(value).trim();
    if !is_digits(digits) {
        return Err(syntax(
            line_no,
            format!("{} must be an integer, found '{}'", keyword.as_str(), value),
        ));
    }
    digits.parse().map_err(|_| {
        syntax(
            line_no,
            format!("{} value '{}' is too large", keyword.as_str(), digits),
        )
    })
}

/// Strips one pair of matching single or double quotes.
fn unquote(s: &str) -> Option<&str> {
    ['"', '\'']
        .into_iter()
        .find_map(|q| s.strip_prefix(q)?.strip_suffix(q))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn syntax(line_no: usize, message: impl Into<String>) -> FsmValidationError {
    FsmValidationError::at(line_no, ErrorKind::Syntax, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TransitionMap;
    use crate::indexing::Indexing;

    const DIVBY4: &str = r#"Name = "divby4fsm"
states = 4
symbols = {0, 1}
transitions =   1: on '0' Move '1', on '1' Move '1'
        2: on '0' move '2', on '1' Move '3'
        3. On '0' move '1', on '1' move '1'
        4. On '0' move '2', on '1' move '3'
startstate = 1
acceptstate = 1
"#;

    fn map(rows: &[(StateId, [(&str, StateId); 2])]) -> TransitionMap {
        rows.iter()
            .map(|(id, entries)| {
                (
                    *id,
                    entries.iter().map(|(s, t)| (s.to_string(), *t)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_parse_divby4() {
        let fsm = parse(DIVBY4).unwrap();

        assert_eq!(fsm.name(), "divby4fsm");
        assert_eq!(fsm.states(), 4);
        assert_eq!(fsm.symbols(), ["0", "1"]);
        assert_eq!(fsm.startstate(), 1);
        assert_eq!(fsm.acceptstate(), 1);
        assert!(!fsm.zero_indexed());
        assert_eq!(
            fsm.transitions(),
            &map(&[
                (1, [("0", 1), ("1", 1)]),
                (2, [("0", 2), ("1", 3)]),
                (3, [("0", 1), ("1", 1)]),
                (4, [("0", 2), ("1", 3)]),
            ])
        );
    }

    #[test]
    fn test_dotted_dialect_matches_natural() {
        let dotted = r#"name = 'divby4fsm'
STATES = "4"
symbols = {0, 1}
transitions =
1: 0.1, 1.1
2: 0.2, 1.3
3 {0.1, 1.1}
4. 0.2,1.3
startstate = 1
acceptstate = 1
"#;
        let a = parse(DIVBY4).unwrap();
        let b = parse(dotted).unwrap();
        assert_eq!(a.transitions(), b.transitions());
        assert_eq!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_natural_dialect_tolerates_typos() {
        let (id, entries) = parse_row(1, r#"2: ON '0'. mocve '1', on "1" MOVE '2'"#).unwrap();
        assert_eq!(id, 2);
        assert_eq!(entries, vec![("0".to_string(), 1), ("1".to_string(), 2)]);
    }

    #[test]
    fn test_natural_multichar_symbols() {
        let (_, entries) = parse_row(1, "1: on 'ab' move '2', on 'ba' move '1'").unwrap();
        assert_eq!(entries, vec![("ab".to_string(), 2), ("ba".to_string(), 1)]);
    }

    #[test]
    fn test_row_without_state_number() {
        let err = parse_row(7, "on '0' move '1'").unwrap_err();
        assert_eq!(err.line, 7);
        assert_eq!(err.kind, ErrorKind::Syntax);
    }

    #[test]
    fn test_row_without_transitions() {
        let err = parse_row(3, "1: go to 2").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("state 1"));

        // One malformed dotted token spoils the whole row.
        assert!(parse_row(3, "1: 0.1, 1x2").is_err());
    }

    #[test]
    fn test_missing_acceptstate() {
        let text = DIVBY4.replace("acceptstate = 1\n", "");
        let err = parse(&text).unwrap_err();
        assert_eq!(err.line, 0);
        assert_eq!(err.kind, ErrorKind::MissingFields);
        assert!(err.message.contains("acceptstate"));
        assert_eq!(err.message, "Missing required fields: acceptstate");
    }

    #[test]
    fn test_precheck_lists_every_missing_field() {
        let err = parse("Name = \"x\"\n").unwrap_err();
        assert_eq!(
            err.message,
            "Missing required fields: states, symbols, transitions, startstate, acceptstate"
        );
    }

    #[test]
    fn test_count_mismatch() {
        let text = DIVBY4.replace("        4. On '0' move '2', on '1' move '3'\n", "");
        let err = parse(&text).unwrap_err();
        assert_eq!(err.line, 0);
        assert_eq!(err.kind, ErrorKind::CountMismatch);
        assert_eq!(
            err.message,
            "Expected 4 transition rows (one per state), found 3"
        );
    }

    #[test]
    fn test_shifted_indexing() {
        let text = r#"Name = "shifted"
states = 3
symbols = {a, b}
transitions =
1: on 'a' move '1', on 'b' move '0'
2: on 'a' move '2', on 'b' move '0'
3: on 'a' move '2', on 'b' move '2'
startstate = 1
acceptstate = 3
"#;
        let fsm = parse(text).unwrap();
        assert!(fsm.zero_indexed());
        assert_eq!(fsm.startstate(), 0);
        assert_eq!(fsm.acceptstate(), 2);
        assert_eq!(
            fsm.transitions(),
            &map(&[
                (0, [("a", 1), ("b", 0)]),
                (1, [("a", 2), ("b", 0)]),
                (2, [("a", 2), ("b", 2)]),
            ])
        );
    }

    #[test]
    fn test_zero_based_as_authored() {
        let text = r#"Name = "zero"
states = 2
symbols = {0, 1}
transitions =
0: 0.0, 1.1
1: 0.1, 1.0
startstate = 0
acceptstate = 1
"#;
        let fsm = parse(text).unwrap();
        assert_eq!(fsm.indexing(), Indexing::ZeroBased);
        assert_eq!(fsm.transition(1, "1"), Some(0));
    }

    #[test]
    fn test_block_ends_at_keyword() {
        let text = r#"Name = "t"
symbols = {0}
transitions = 1: on '0' move '1'
states = 1
2: on '0' move '1'
startstate = 1
acceptstate = 1
"#;
        let err = parse(text).unwrap_err();
        assert_eq!(err.line, 5);
        assert!(err.message.starts_with("Unexpected line"));
    }

    #[test]
    fn test_duplicate_row() {
        let text = DIVBY4.replace("3. On", "2. On");
        let err = parse(&text).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateRow);
        assert_eq!(err.line, 6);
    }

    #[test]
    fn test_duplicate_declaration() {
        let text = format!("{}states = 4\n", DIVBY4);
        let err = parse(&text).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateDeclaration);
        assert_eq!(err.line, 10);
    }

    #[test]
    fn test_missing_equals() {
        let text = DIVBY4.replace("states = 4", "states 4");
        let err = parse(&text).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("'='"));
    }

    #[test]
    fn test_bad_declarations() {
        let cases = [
            ("Name = \"divby4fsm\"", "Name = divby4fsm", 1),
            ("states = 4", "states = four", 2),
            ("states = 4", "states = 0", 2),
            ("symbols = {0, 1}", "symbols = 0, 1", 3),
            ("symbols = {0, 1}", "symbols = { }", 3),
            ("startstate = 1", "startstate = -1", 8),
        ];
        for (from, to, line) in cases {
            let err = parse(&DIVBY4.replace(from, to)).unwrap_err();
            assert_eq!(err.line, line, "{}", to);
            assert_eq!(err.kind, ErrorKind::Syntax, "{}", to);
        }
    }

    #[test]
    fn test_target_out_of_range_reports_row_line() {
        let text = DIVBY4.replace("on '1' Move '3'", "on '1' Move '9'");
        let err = parse(&text).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TargetOutOfRange);
        assert_eq!(err.line, 5);
    }

    #[test]
    fn test_keyword_boundaries() {
        assert_eq!(
            Keyword::strip_from("StartState= 1").map(|(k, _)| k),
            Some(Keyword::StartState)
        );
        assert!(Keyword::strip_from("statesman = 1").is_none());
        assert!(Keyword::strip_from("é").is_none());
    }

    #[test]
    fn test_crlf_input() {
        let fsm = parse(&DIVBY4.replace('\n', "\r\n")).unwrap();
        assert_eq!(fsm.states(), 4);
    }

    #[test]
    fn test_parse_determinism() {
        let first = parse(DIVBY4).unwrap();
        for _ in 0..100 {
            assert_eq!(parse(DIVBY4).unwrap(), first);
        }
    }
}
