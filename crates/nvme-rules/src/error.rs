// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rule-set load errors.

use thiserror::Error;

use crate::position::Position;

/// What went wrong while reading a rule file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A string literal ran to the end of the line.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// A character that cannot start any token.
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    /// A token other than the one the grammar needs.
    #[error("expected {expected}, found `{found}`")]
    UnexpectedToken {
        /// What the grammar needs here.
        expected: &'static str,
        /// What the file has.
        found: String,
    },
    /// The line ended before the record was complete.
    #[error("expected {expected} before end of line")]
    UnexpectedEnd {
        /// What the grammar needs here.
        expected: &'static str,
    },
    /// A rule or group name that is not an identifier.
    #[error("invalid name `{0}`")]
    InvalidName(String),
    /// A target or reference that is not a valid path pattern.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath {
        /// Offending text.
        path: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A malformed number.
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    /// A malformed `lo..hi` range.
    #[error("invalid range `{0}`")]
    InvalidRange(String),
    /// A unit outside the vocabulary.
    #[error("unknown unit `{0}`")]
    UnknownUnit(String),
    /// A severity other than `info`, `warn` or `fail`.
    #[error("unknown severity `{0}`")]
    UnknownSeverity(String),
    /// The same option given twice on one rule.
    #[error("option `{0}` given twice")]
    DuplicateOption(&'static str),
    /// A rule name used twice in one rule-set.
    #[error("duplicate rule name `{0}`")]
    DuplicateRule(String),
}

/// A rule-set failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}: {kind}")]
pub struct RuleParseError {
    /// Where the problem starts.
    pub position: Position,
    /// What the problem is.
    pub kind: ParseErrorKind,
}

impl RuleParseError {
    pub(crate) fn new(position: Position, kind: ParseErrorKind) -> Self {
        Self { position, kind }
    }
}
