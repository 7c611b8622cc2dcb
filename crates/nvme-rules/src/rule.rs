// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rule model: rules are data, evaluated by a single dispatcher.

use nvme_info::{PathPattern, Unit, Value};
use serde::Serialize;
use tracing::error;

use crate::error::{ParseErrorKind, RuleParseError};
use crate::position::Position;

const HEALTH_RULES: &str = include_str!("builtin/health.rules");
const CHANGE_RULES: &str = include_str!("builtin/changes.rules");

/// Ordering and equality comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=` / `≤`
    Le,
    /// `>`
    Gt,
    /// `>=` / `≥`
    Ge,
}

impl Comparison {
    /// Whether this comparison only needs equality.
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    /// Apply to an ordering of target relative to reference.
    pub fn holds(self, order: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Eq => order == Equal,
            Self::Ne => order != Equal,
            Self::Lt => order == Less,
            Self::Le => order != Greater,
            Self::Gt => order == Greater,
            Self::Ge => order != Less,
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// A literal (numbers are taken in the target's unit).
    Literal(Value),
    /// Another field; a `*` binds to the target's wildcard segment.
    Path(PathPattern),
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(Value::Text(s)) => write!(f, "{s:?}"),
            Self::Literal(v) => write_literal(f, v),
            Self::Path(p) => f.write_str(p.as_str()),
        }
    }
}

fn write_literal(f: &mut std::fmt::Formatter<'_>, v: &Value) -> std::fmt::Result {
    match v {
        Value::Int(n) => write!(f, "{n}"),
        Value::Real(x) => write!(f, "{x}"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Text(s) | Value::Enum(s) => f.write_str(s),
        other => f.write_str(other.kind()),
    }
}

/// What a rule checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Compare the target against a reference.
    Compare(Comparison, Reference),
    /// Inclusive range; `None` is an open bound.
    InRange {
        /// Lower bound.
        lo: Option<Value>,
        /// Upper bound.
        hi: Option<Value>,
    },
    /// The target exists with a value other than `absent`.
    Present,
    /// The target is missing or `absent`.
    Absent,
    /// Same value before and after (pair evaluation only).
    Unchanged,
    /// `after - before` is at most the given amount (pair evaluation only).
    DeltaAtMost(Value),
}

impl Operator {
    /// Whether the operator needs a before/after pair.
    pub fn needs_pair(&self) -> bool {
        matches!(self, Self::Unchanged | Self::DeltaAtMost(_))
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = |f: &mut std::fmt::Formatter<'_>, b: &Option<Value>| match b {
            Some(v) => write_literal(f, v),
            None => f.write_str("*"),
        };
        match self {
            Self::Compare(c, r) => write!(f, "{c} {r}"),
            Self::InRange { lo, hi } => {
                f.write_str("in-range ")?;
                bound(f, lo)?;
                f.write_str("..")?;
                bound(f, hi)
            }
            Self::Present => f.write_str("present"),
            Self::Absent => f.write_str("absent"),
            Self::Unchanged => f.write_str("unchanged"),
            Self::DeltaAtMost(v) => {
                f.write_str("delta<= ")?;
                write_literal(f, v)
            }
        }
    }
}

/// How seriously a failing rule is taken upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported, never fatal.
    Info,
    /// Potential issue.
    Warn,
    /// Check failed.
    #[default]
    Fail,
}

impl Severity {
    pub(crate) fn parse(word: &str) -> Option<Self> {
        match word {
            "info" => Some(Self::Info),
            "warn" => Some(Self::Warn),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// One verification rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Unique name within its rule-set.
    pub name: String,
    /// Enclosing `[group]`, if any.
    pub group: Option<String>,
    /// Target path or single-wildcard pattern.
    pub target: PathPattern,
    /// Check to perform.
    pub operator: Operator,
    /// Unit the target is converted to before comparison.
    pub unit: Option<Unit>,
    /// Severity of a failure.
    pub severity: Severity,
    /// Where the rule was declared.
    pub position: Position,
}

/// An ordered rule-set with unique rule names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Parse a rule file.
    pub fn parse(source: &str) -> Result<Self, RuleParseError> {
        crate::parser::parse(source)
    }

    pub(crate) fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    fn builtin(name: &str, source: &str) -> Self {
        Self::parse(source).unwrap_or_else(|e| {
            error!(set = name, error = %e, "built-in rule-set failed to load");
            Self::default()
        })
    }

    /// Built-in single-snapshot health checks.
    pub fn health() -> Self {
        Self::builtin("health", HEALTH_RULES)
    }

    /// Built-in before/after drift checks.
    pub fn changes() -> Self {
        Self::builtin("changes", CHANGE_RULES)
    }

    /// Append `other`, rejecting rule names already present.
    pub fn merged(mut self, other: Self) -> Result<Self, RuleParseError> {
        for rule in other.rules {
            if self.get(&rule.name).is_some() {
                return Err(RuleParseError::new(
                    rule.position,
                    ParseErrorKind::DuplicateRule(rule.name),
                ));
            }
            self.rules.push(rule);
        }
        Ok(self)
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rule named `name`.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
