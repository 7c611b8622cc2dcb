// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical change-sets between two trees.
//!
//! The union of both key sets is walked in lexicographic order, so the
//! output is sorted by path by construction. `unknown` and `absent` values
//! count as "not present": a field gaining a concrete value is `added`, one
//! losing it is `removed`.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use tracing::trace;

use crate::config::AnalysisConfig;
use crate::path::{FieldPath, PathPattern};
use crate::tree::InfoTree;
use crate::units::Unit;
use crate::value::{ComparePolicy, Field, Value};

/// Kind of a [`Change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present only after.
    Added,
    /// Present only before.
    Removed,
    /// Present in both with a reportable difference.
    Changed,
}

impl ChangeKind {
    /// The kind seen from the opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Self::Added => Self::Removed,
            Self::Removed => Self::Added,
            Self::Changed => Self::Changed,
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
        })
    }
}

/// A value together with its unit, as captured on one side of a diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// The value.
    pub value: Value,
    /// Its unit.
    pub unit: Unit,
}

impl Sample {
    fn of(field: &Field) -> Self {
        Self {
            value: field.value().clone(),
            unit: field.unit(),
        }
    }
}

/// One entry of a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    /// Field path.
    pub path: FieldPath,
    /// What happened.
    pub kind: ChangeKind,
    /// Value before (absent for `added`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Sample>,
    /// Value after (absent for `removed`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Sample>,
    /// Compare policy in force.
    pub policy: ComparePolicy,
}

impl Change {
    /// The same change seen from the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            path: self.path.clone(),
            kind: self.kind.reversed(),
            before: self.after.clone(),
            after: self.before.clone(),
            policy: self.policy,
        }
    }
}

/// Sorted sequence of changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Changes in path order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterate over changes.
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Change for `path`, if any.
    pub fn get(&self, path: &str) -> Option<&Change> {
        self.changes
            .binary_search_by(|c| c.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.changes[i])
    }

    /// Swap `added`/`removed` and `before`/`after` in every change.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            changes: self.changes.iter().map(Change::reversed).collect(),
        }
    }

    /// Keep only changes whose policy satisfies `keep`.
    #[must_use]
    pub fn filter_policy(&self, keep: impl Fn(ComparePolicy) -> bool) -> Self {
        Self {
            changes: self
                .changes
                .iter()
                .filter(|c| keep(c.policy))
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Patterns whose paths (and descendants) the differ suppresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareMask {
    patterns: Vec<PathPattern>,
}

impl CompareMask {
    /// Mask from explicit patterns.
    pub fn new(patterns: impl IntoIterator<Item = PathPattern>) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
        }
    }

    /// Mask configured in `config.compare_mask`.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.compare_mask.iter().cloned())
    }

    /// Add a pattern.
    pub fn push(&mut self, pattern: PathPattern) {
        self.patterns.push(pattern);
    }

    /// Whether `path` is masked.
    pub fn masks(&self, path: &FieldPath) -> bool {
        self.patterns.iter().any(|p| p.covers(path))
    }
}

fn concrete(tree: &InfoTree, path: &FieldPath) -> Option<Sample> {
    tree.get(path)
        .filter(|f| f.value().is_concrete())
        .map(Sample::of)
}

fn numeric_order(before: &Value, after: &Value) -> Option<Ordering> {
    match (before, after) {
        (Value::Int(b), Value::Int(a)) => Some(a.cmp(b)),
        _ => after.as_f64()?.partial_cmp(&before.as_f64()?),
    }
}

fn differs(policy: ComparePolicy, before: &Sample, after: &Sample) -> bool {
    match policy {
        ComparePolicy::Ignore => false,
        ComparePolicy::Compare => before != after,
        ComparePolicy::Monotonic => {
            if before.unit != after.unit {
                return true;
            }
            match numeric_order(&before.value, &after.value) {
                Some(order) => order == Ordering::Less,
                // Non-numeric monotonic fields fall back to plain comparison.
                None => before.value != after.value,
            }
        }
    }
}

/// Diff two trees.
pub fn diff(before: &InfoTree, after: &InfoTree) -> ChangeSet {
    diff_masked(before, after, &CompareMask::default())
}

/// Diff two trees, suppressing every path covered by `mask`.
pub fn diff_masked(before: &InfoTree, after: &InfoTree, mask: &CompareMask) -> ChangeSet {
    let paths: BTreeSet<&FieldPath> = before.paths().chain(after.paths()).collect();
    let mut changes = Vec::new();
    for path in paths {
        if mask.masks(path) {
            continue;
        }
        let policy = after
            .get(path)
            .or_else(|| before.get(path))
            .map_or(ComparePolicy::Compare, Field::policy);
        if policy == ComparePolicy::Ignore {
            continue;
        }
        let kind = match (concrete(before, path), concrete(after, path)) {
            (None, None) => continue,
            (Some(b), None) => (ChangeKind::Removed, Some(b), None),
            (None, Some(a)) => (ChangeKind::Added, None, Some(a)),
            (Some(b), Some(a)) => {
                if !differs(policy, &b, &a) {
                    continue;
                }
                (ChangeKind::Changed, Some(b), Some(a))
            }
        };
        trace!(path = %path, kind = %kind.0, "change");
        changes.push(Change {
            path: path.clone(),
            kind: kind.0,
            before: kind.1,
            after: kind.2,
            policy,
        });
    }
    ChangeSet { changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::BlockId;
    use crate::tree::TreeBuilder;
    use crate::value::Provenance;

    fn tree(entries: &[(&str, Value, ComparePolicy)]) -> InfoTree {
        let mut b = TreeBuilder::new();
        for (p, v, policy) in entries {
            b.insert(
                FieldPath::parse(p).unwrap(),
                Field::new(v.clone(), Unit::Count, Provenance::block(&BlockId::Smart, 0, 1))
                    .with_policy(*policy),
            )
            .unwrap();
        }
        b.finish()
    }

    #[test]
    fn unknown_and_absent_transitions() {
        use ComparePolicy::Compare as C;
        let a = tree(&[
            ("smart.a", Value::Unknown, C),
            ("smart.b", Value::Int(1), C),
            ("smart.c", Value::Unknown, C),
        ]);
        let b = tree(&[
            ("smart.a", Value::Int(1), C),
            ("smart.b", Value::Absent, C),
            ("smart.c", Value::Unknown, C),
        ]);
        let cs = diff(&a, &b);
        assert_eq!(cs.len(), 2);
        assert_eq!(cs.get("smart.a").unwrap().kind, ChangeKind::Added);
        assert_eq!(cs.get("smart.b").unwrap().kind, ChangeKind::Removed);
        assert!(cs.get("smart.c").is_none());
    }

    #[test]
    fn monotonic_reports_only_decrease() {
        use ComparePolicy::Monotonic as M;
        let lo = tree(&[("smart.power_on_hours", Value::Int(100), M)]);
        let hi = tree(&[("smart.power_on_hours", Value::Int(150), M)]);
        assert!(diff(&lo, &hi).is_empty());
        let back = diff(&hi, &lo);
        assert_eq!(back.len(), 1);
        assert_eq!(
            back.changes()[0].after.as_ref().unwrap().value,
            Value::Int(100)
        );
    }

    #[test]
    fn ignore_and_mask_suppress() {
        let a = tree(&[
            ("host.timestamp", Value::Int(1), ComparePolicy::Ignore),
            ("namespace.1.x", Value::Int(1), ComparePolicy::Compare),
            ("smart.x", Value::Int(1), ComparePolicy::Compare),
        ]);
        let b = tree(&[
            ("host.timestamp", Value::Int(2), ComparePolicy::Ignore),
            ("namespace.1.x", Value::Int(2), ComparePolicy::Compare),
            ("smart.x", Value::Int(2), ComparePolicy::Compare),
        ]);
        let mask = CompareMask::new([PathPattern::parse("namespace.*").unwrap()]);
        let cs = diff_masked(&a, &b, &mask);
        let paths: Vec<_> = cs.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["smart.x"]);
    }

    #[test]
    fn bytes_compare_bytewise() {
        use ComparePolicy::Compare as C;
        let a = tree(&[("vendor.c0.bytes", Value::Bytes(vec![1, 2]), C)]);
        let b = tree(&[("vendor.c0.bytes", Value::Bytes(vec![1, 3]), C)]);
        assert_eq!(diff(&a, &b).len(), 1);
        assert!(diff(&a, &a).is_empty());
    }

    #[test]
    fn reversal_swaps_sides() {
        use ComparePolicy::Compare as C;
        let a = tree(&[("smart.x", Value::Int(1), C), ("smart.y", Value::Int(1), C)]);
        let b = tree(&[("smart.x", Value::Int(2), C), ("smart.z", Value::Int(1), C)]);
        assert_eq!(diff(&a, &b).reversed(), diff(&b, &a));
    }
}
