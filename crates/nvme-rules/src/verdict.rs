// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Verdict records and their aggregation.
//!
//! The verifier only reports; callers decide what a failure means. A
//! [`VerdictSummary`] is the usual way to do that: it counts outcomes and
//! maps them onto a process exit code where only non-`info` failures count.

use nvme_info::{FieldPath, Unit, Value};
use serde::Serialize;

use crate::rule::Severity;

/// Result of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The check held.
    Pass,
    /// The check did not hold.
    Fail,
    /// The target was absent (or the rule needs a before/after pair).
    Skip,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
        })
    }
}

/// A value the verifier looked at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observed {
    /// Field path.
    pub path: FieldPath,
    /// Observed value (from `after` in pair mode).
    pub value: Value,
    /// Unit of `value`.
    pub unit: Unit,
    /// Value in the `before` tree, for pair operators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
}

/// Outcome of evaluating one rule against a tree (or pair of trees).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    /// Rule name.
    pub rule: String,
    /// Rule group, if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Target as written in the rule.
    pub target: String,
    /// Concrete paths the target resolved to.
    pub paths: Vec<FieldPath>,
    /// Values seen at those paths.
    pub observed: Vec<Observed>,
    /// Operator and reference as written in the rule.
    pub check: String,
    /// Combined outcome.
    pub outcome: Outcome,
    /// Rule severity.
    pub severity: Severity,
    /// Human-readable explanation.
    pub reason: String,
}

impl Verdict {
    /// Whether this verdict should fail a run.
    pub fn is_fatal(&self) -> bool {
        self.outcome == Outcome::Fail && self.severity != Severity::Info
    }
}

/// Outcome counts over a verdict list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerdictSummary {
    /// Verdicts counted.
    pub total: usize,
    /// Passing verdicts.
    pub passed: usize,
    /// Failing verdicts of any severity.
    pub failed: usize,
    /// Skipped verdicts.
    pub skipped: usize,
    /// Failing verdicts with severity `warn` or `fail`.
    pub fatal: usize,
}

impl VerdictSummary {
    /// Count outcomes.
    pub fn of(verdicts: &[Verdict]) -> Self {
        verdicts.iter().fold(Self::default(), |mut s, v| {
            s.total += 1;
            match v.outcome {
                Outcome::Pass => s.passed += 1,
                Outcome::Fail => s.failed += 1,
                Outcome::Skip => s.skipped += 1,
            }
            if v.is_fatal() {
                s.fatal += 1;
            }
            s
        })
    }

    /// `1` when any non-`info` verdict failed, else `0`.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.fatal > 0)
    }
}

impl std::fmt::Display for VerdictSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} rules: {} passed, {} failed, {} skipped",
            self.total, self.passed, self.failed, self.skipped
        )
    }
}
