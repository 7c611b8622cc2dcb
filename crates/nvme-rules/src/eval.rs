// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The verifier: one dispatcher over operator tags.
//!
//! Evaluation is total. Every rule yields exactly one [`Verdict`], and rule
//! problems discovered at evaluation time (type or unit mismatches, unknown
//! values) become `fail` verdicts with a reason rather than errors.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use nvme_info::{Field, FieldPath, InfoTree, Unit, Value};
use tracing::trace;

use crate::rule::{Comparison, Operator, Reference, Rule, RuleSet};
use crate::verdict::{Observed, Outcome, Verdict};

const TYPE_MISMATCH: &str = "type-mismatch";
const UNIT_INCOMPATIBLE: &str = "unit-incompatible";
const UNKNOWN_VALUE: &str = "unknown-value";

/// Evaluate `rules` against one tree.
///
/// Pair-only operators (`unchanged`, `delta<=`) are skipped.
pub fn verify(tree: &InfoTree, rules: &RuleSet) -> Vec<Verdict> {
    rules.iter().map(|r| evaluate(r, Scope::Single(tree))).collect()
}

/// Evaluate `rules` against a before/after pair.
///
/// Ordinary operators look at `after`; pair operators compare both sides.
pub fn verify_pair(before: &InfoTree, after: &InfoTree, rules: &RuleSet) -> Vec<Verdict> {
    rules
        .iter()
        .map(|r| evaluate(r, Scope::Pair { before, after }))
        .collect()
}

#[derive(Clone, Copy)]
enum Scope<'t> {
    Single(&'t InfoTree),
    Pair {
        before: &'t InfoTree,
        after: &'t InfoTree,
    },
}

impl<'t> Scope<'t> {
    fn current(self) -> &'t InfoTree {
        match self {
            Self::Single(t) => t,
            Self::Pair { after, .. } => after,
        }
    }

    fn before(self) -> Option<&'t InfoTree> {
        match self {
            Self::Single(_) => None,
            Self::Pair { before, .. } => Some(before),
        }
    }
}

/// Outcome for a single expanded path.
struct Check {
    outcome: Outcome,
    reason: String,
}

impl Check {
    fn pass(reason: String) -> Self {
        Self {
            outcome: Outcome::Pass,
            reason,
        }
    }

    fn fail(reason: String) -> Self {
        Self {
            outcome: Outcome::Fail,
            reason,
        }
    }

    fn skip(reason: String) -> Self {
        Self {
            outcome: Outcome::Skip,
            reason,
        }
    }
}

fn present<'t>(tree: &'t InfoTree, path: &FieldPath) -> Option<&'t Field> {
    tree.get(path).filter(|f| *f.value() != Value::Absent)
}

fn show(value: &Value, unit: Unit) -> String {
    let text = match value {
        Value::Int(v) => v.to_string(),
        Value::Real(v) => format!("{v:.4}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Text(s) => format!("{s:?}"),
        Value::Enum(s) => s.clone(),
        Value::Bytes(b) => b.iter().map(|x| format!("{x:02x}")).collect(),
        other => return other.kind().to_owned(),
    };
    if unit.is_displayed() {
        format!("{text} {unit}")
    } else {
        text
    }
}

/// Convert `value` from `from` into `to` (when a unit is declared).
fn coerce(value: &Value, from: Unit, to: Option<Unit>) -> Result<(Value, Unit), &'static str> {
    let Some(to) = to.filter(|t| *t != from) else {
        return Ok((value.clone(), from));
    };
    let conversion = from.conversion_to(to).ok_or(UNIT_INCOMPATIBLE)?;
    let x = value.as_f64().ok_or(TYPE_MISMATCH)?;
    Ok((Value::Real(conversion.apply(x)), to))
}

/// Order `a` relative to `b`. Non-numeric kinds only support equality.
fn order(a: &Value, b: &Value, equality_only: bool) -> Result<Ordering, &'static str> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (x, y) if x.is_numeric() && y.is_numeric() => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).ok_or(TYPE_MISMATCH)
        }
        _ if !equality_only => Err(TYPE_MISMATCH),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x.cmp(y)),
        (x, y) => match (x.as_str(), y.as_str()) {
            (Some(x), Some(y)) => Ok(x.cmp(y)),
            _ => Err(TYPE_MISMATCH),
        },
    }
}

fn resolve_reference(
    rule: &Rule,
    reference: &Reference,
    path: &FieldPath,
    target_unit: Unit,
    tree: &InfoTree,
) -> Result<(Value, Unit, String), String> {
    let pattern = match reference {
        Reference::Literal(v) => return Ok((v.clone(), target_unit, reference.to_string())),
        Reference::Path(p) => p,
    };
    let segment = rule.target.capture(path).unwrap_or("");
    let resolved = pattern
        .bind(segment)
        .map_err(|e| format!("invalid reference {pattern}: {e}"))?;
    let field = present(tree, &resolved).ok_or_else(|| format!("reference {resolved} missing"))?;
    if *field.value() == Value::Unknown {
        return Err(format!("{resolved}: {UNKNOWN_VALUE}"));
    }
    let (value, unit) = match rule.unit {
        Some(_) => coerce(field.value(), field.unit(), rule.unit)
            .map_err(|r| format!("{resolved}: {r}"))?,
        None if field.unit() != target_unit => {
            return Err(format!(
                "{path} in {target_unit} vs {resolved} in {}: {UNIT_INCOMPATIBLE}",
                field.unit()
            ))
        }
        None => (field.value().clone(), field.unit()),
    };
    let label = format!("{resolved} ({})", show(&value, unit));
    Ok((value, unit, label))
}

fn compare(
    rule: &Rule,
    cmp: Comparison,
    reference: &Reference,
    path: &FieldPath,
    tree: &InfoTree,
) -> Check {
    let Some(field) = present(tree, path) else {
        return Check::skip(format!("{path} absent"));
    };
    if *field.value() == Value::Unknown {
        return Check::fail(format!("{path}: {UNKNOWN_VALUE}"));
    }
    let (value, unit) = match coerce(field.value(), field.unit(), rule.unit) {
        Ok(v) => v,
        Err(reason) => return Check::fail(format!("{path}: {reason}")),
    };
    let (rhs, _, label) = match resolve_reference(rule, reference, path, unit, tree) {
        Ok(r) => r,
        Err(reason) => return Check::fail(reason),
    };
    let shown = show(&value, unit);
    match order(&value, &rhs, cmp.is_equality()) {
        Ok(ord) if cmp.holds(ord) => Check::pass(format!("{path} = {shown} {cmp} {label}")),
        Ok(_) => Check::fail(format!("{path} = {shown}, expected {cmp} {label}")),
        Err(reason) => Check::fail(format!(
            "{path}: {reason} ({} vs {})",
            value.kind(),
            rhs.kind()
        )),
    }
}

fn in_range(
    rule: &Rule,
    lo: Option<&Value>,
    hi: Option<&Value>,
    path: &FieldPath,
    tree: &InfoTree,
) -> Check {
    let Some(field) = present(tree, path) else {
        return Check::skip(format!("{path} absent"));
    };
    if *field.value() == Value::Unknown {
        return Check::fail(format!("{path}: {UNKNOWN_VALUE}"));
    }
    let (value, unit) = match coerce(field.value(), field.unit(), rule.unit) {
        Ok(v) => v,
        Err(reason) => return Check::fail(format!("{path}: {reason}")),
    };
    if !value.is_numeric() {
        return Check::fail(format!("{path}: {TYPE_MISMATCH} ({})", value.kind()));
    }
    let above = lo.map_or(Ok(true), |b| order(&value, b, false).map(|o| o != Ordering::Less));
    let below = hi.map_or(Ok(true), |b| order(&value, b, false).map(|o| o != Ordering::Greater));
    let shown = show(&value, unit);
    let bound = |b: Option<&Value>| b.map_or_else(|| "*".to_owned(), |v| show(v, Unit::Unitless));
    let range = format!("{}..{}", bound(lo), bound(hi));
    match (above, below) {
        (Ok(true), Ok(true)) => Check::pass(format!("{path} = {shown} within {range}")),
        (Ok(_), Ok(_)) => Check::fail(format!("{path} = {shown} outside {range}")),
        (Err(reason), _) | (_, Err(reason)) => Check::fail(format!("{path}: {reason}")),
    }
}

fn presence(path: &FieldPath, tree: &InfoTree, want: bool) -> Check {
    match (present(tree, path).is_some(), want) {
        (true, true) => Check::pass(format!("{path} present")),
        (false, false) => Check::pass(format!("{path} absent")),
        (true, false) => Check::fail(format!("{path} present, expected absent")),
        (false, true) => Check::fail(format!("{path} missing")),
    }
}

/// Both sides of a pair operator, coerced into a common unit.
fn pair_values(
    rule: &Rule,
    path: &FieldPath,
    before: &InfoTree,
    after: &InfoTree,
) -> Result<((Value, Unit), (Value, Unit)), Check> {
    let (b, a) = match (present(before, path), present(after, path)) {
        (None, None) => return Err(Check::skip(format!("{path} absent"))),
        (Some(_), None) => return Err(Check::fail(format!("{path} disappeared"))),
        (None, Some(_)) => return Err(Check::fail(format!("{path} appeared"))),
        (Some(b), Some(a)) => (b, a),
    };
    if *b.value() == Value::Unknown || *a.value() == Value::Unknown {
        return Err(Check::fail(format!("{path}: {UNKNOWN_VALUE}")));
    }
    let fail = |r: &str| Check::fail(format!("{path}: {r}"));
    let before = coerce(b.value(), b.unit(), rule.unit).map_err(fail)?;
    let after = coerce(a.value(), a.unit(), rule.unit).map_err(fail)?;
    if before.1 != after.1 {
        return Err(fail(UNIT_INCOMPATIBLE));
    }
    Ok((before, after))
}

fn unchanged(rule: &Rule, path: &FieldPath, before: &InfoTree, after: &InfoTree) -> Check {
    let ((b, unit), (a, _)) = match pair_values(rule, path, before, after) {
        Ok(v) => v,
        Err(check) => return check,
    };
    match order(&b, &a, true) {
        Ok(Ordering::Equal) => Check::pass(format!("{path} unchanged at {}", show(&a, unit))),
        Ok(_) => Check::fail(format!(
            "{path} changed {} -> {}",
            show(&b, unit),
            show(&a, unit)
        )),
        Err(reason) => Check::fail(format!("{path}: {reason}")),
    }
}

fn delta_at_most(
    rule: &Rule,
    limit: &Value,
    path: &FieldPath,
    before: &InfoTree,
    after: &InfoTree,
) -> Check {
    let ((b, unit), (a, _)) = match pair_values(rule, path, before, after) {
        Ok(v) => v,
        Err(check) => return check,
    };
    let delta = match (&b, &a) {
        (Value::Int(b), Value::Int(a)) if a >= b => (a - b) as f64,
        (Value::Int(b), Value::Int(a)) => -((b - a) as f64),
        _ => match (b.as_f64(), a.as_f64()) {
            (Some(b), Some(a)) => a - b,
            _ => return Check::fail(format!("{path}: {TYPE_MISMATCH}")),
        },
    };
    let Some(limit) = limit.as_f64() else {
        return Check::fail(format!("{path}: {TYPE_MISMATCH}"));
    };
    let shown = show(&Value::Real(delta), unit);
    if delta <= limit {
        Check::pass(format!("{path} moved by {shown} (<= {limit})"))
    } else {
        Check::fail(format!("{path} moved by {shown}, limit {limit}"))
    }
}

fn check(rule: &Rule, path: &FieldPath, scope: Scope<'_>) -> Check {
    let tree = scope.current();
    match (&rule.operator, scope.before()) {
        (Operator::Compare(cmp, reference), _) => compare(rule, *cmp, reference, path, tree),
        (Operator::InRange { lo, hi }, _) => in_range(rule, lo.as_ref(), hi.as_ref(), path, tree),
        (Operator::Present, _) => presence(path, tree, true),
        (Operator::Absent, _) => presence(path, tree, false),
        (Operator::Unchanged | Operator::DeltaAtMost(_), None) => {
            Check::skip("requires a before/after pair".to_owned())
        }
        (Operator::Unchanged, Some(before)) => unchanged(rule, path, before, tree),
        (Operator::DeltaAtMost(limit), Some(before)) => {
            delta_at_most(rule, limit, path, before, tree)
        }
    }
}

fn observe(path: &FieldPath, scope: Scope<'_>, pair_operator: bool) -> Option<Observed> {
    let before = scope
        .before()
        .filter(|_| pair_operator)
        .and_then(|t| t.get(path))
        .map(|f| f.value().clone());
    match scope.current().get(path) {
        Some(f) => Some(Observed {
            path: path.clone(),
            value: f.value().clone(),
            unit: f.unit(),
            before,
        }),
        None => before.map(|b| Observed {
            path: path.clone(),
            value: Value::Absent,
            unit: Unit::Unitless,
            before: Some(b),
        }),
    }
}

fn expand(rule: &Rule, scope: Scope<'_>) -> Result<Vec<FieldPath>, String> {
    if rule.target.is_exact() {
        return rule
            .target
            .bind("")
            .map(|p| vec![p])
            .map_err(|e| format!("invalid target: {e}"));
    }
    let mut paths: BTreeSet<FieldPath> = scope
        .current()
        .matching(&rule.target)
        .map(|(p, _)| p.clone())
        .collect();
    if let Some(before) = scope.before() {
        paths.extend(before.matching(&rule.target).map(|(p, _)| p.clone()));
    }
    Ok(paths.into_iter().collect())
}

fn combine(checks: &[Check]) -> Outcome {
    if checks.iter().any(|c| c.outcome == Outcome::Fail) {
        Outcome::Fail
    } else if checks.iter().any(|c| c.outcome == Outcome::Pass) {
        Outcome::Pass
    } else {
        Outcome::Skip
    }
}

fn evaluate(rule: &Rule, scope: Scope<'_>) -> Verdict {
    let (paths, checks) = match expand(rule, scope) {
        Ok(paths) if paths.is_empty() => {
            let check = if rule.operator == Operator::Absent {
                Check::pass(format!("no field matches {}", rule.target))
            } else {
                Check::skip(format!("no field matches {}", rule.target))
            };
            (paths, vec![check])
        }
        Ok(paths) => {
            let checks = paths.iter().map(|p| check(rule, p, scope)).collect();
            (paths, checks)
        }
        Err(reason) => (Vec::new(), vec![Check::fail(reason)]),
    };
    let observed = paths
        .iter()
        .filter_map(|p| observe(p, scope, rule.operator.needs_pair()))
        .collect();
    let outcome = combine(&checks);
    let reason = checks
        .iter()
        .map(|c| c.reason.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    trace!(rule = %rule.name, outcome = %outcome, "verdict");
    Verdict {
        rule: rule.name.clone(),
        group: rule.group.clone(),
        target: rule.target.to_string(),
        paths,
        observed,
        check: rule.operator.to_string(),
        outcome,
        severity: rule.severity,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvme_info::{BlockId, Provenance, TreeBuilder};

    fn tree(entries: &[(&str, Value, Unit)]) -> InfoTree {
        let mut b = TreeBuilder::new();
        for (path, value, unit) in entries {
            b.insert(
                FieldPath::parse(path).unwrap(),
                Field::new(value.clone(), *unit, Provenance::block(&BlockId::Smart, 0, 1)),
            )
            .unwrap();
        }
        b.finish()
    }

    fn run(src: &str, t: &InfoTree) -> Verdict {
        verify(t, &RuleSet::parse(src).unwrap()).remove(0)
    }

    fn sample() -> InfoTree {
        tree(&[
            ("smart.available_spare", Value::Int(98), Unit::Percent),
            ("smart.available_spare_threshold", Value::Int(10), Unit::Percent),
            ("smart.composite_temp", Value::Int(310), Unit::Kelvin),
            ("smart.power_on_hours", Value::Int(4000), Unit::Hours),
            ("smart.media_errors", Value::Unknown, Unit::Count),
            ("smart.temp_sensor_2", Value::Absent, Unit::Kelvin),
            ("controller.controller_type", Value::Enum("io".into()), Unit::Unitless),
            ("controller.model_number", Value::Text("Acme".into()), Unit::Unitless),
            ("namespace.1.utilization_fraction", Value::Real(0.25), Unit::Ratio),
            ("namespace.2.utilization_fraction", Value::Real(0.95), Unit::Ratio),
            ("namespace.1.capacity_lba", Value::Int(100), Unit::Blocks),
            ("namespace.1.size_lba", Value::Int(100), Unit::Blocks),
            ("namespace.2.capacity_lba", Value::Int(100), Unit::Blocks),
            ("namespace.2.size_lba", Value::Int(200), Unit::Blocks),
        ])
    }

    #[test]
    fn comparisons_against_literals_and_paths() {
        let t = sample();
        let v = run("rule r: smart.available_spare >= smart.available_spare_threshold", &t);
        assert_eq!(v.outcome, Outcome::Pass, "{}", v.reason);
        assert_eq!(run("rule r: smart.available_spare < 50", &t).outcome, Outcome::Fail);
        assert_eq!(run("rule r: controller.controller_type == io", &t).outcome, Outcome::Pass);
        assert_eq!(run(r#"rule r: controller.model_number != "Acme""#, &t).outcome, Outcome::Fail);
    }

    #[test]
    fn unit_coercion() {
        let t = sample();
        let v = run("rule r: smart.composite_temp in-range 0..70 unit °C", &t);
        assert_eq!(v.outcome, Outcome::Pass, "{}", v.reason);
        assert!(v.reason.contains("37 °C"), "{}", v.reason);
        let v = run("rule r: smart.power_on_hours >= 100 unit d", &t);
        assert_eq!(v.outcome, Outcome::Pass, "{}", v.reason);
        let v = run("rule r: smart.composite_temp < 5 unit GiB", &t);
        assert_eq!(v.outcome, Outcome::Fail);
        assert!(v.reason.contains(UNIT_INCOMPATIBLE));
        let v = run("rule r: smart.available_spare > smart.power_on_hours", &t);
        assert!(v.reason.contains(UNIT_INCOMPATIBLE));
    }

    #[test]
    fn type_mismatch_and_unknown() {
        let t = sample();
        let v = run("rule r: controller.controller_type > 3", &t);
        assert_eq!(v.outcome, Outcome::Fail);
        assert!(v.reason.contains(TYPE_MISMATCH));
        let v = run("rule r: smart.media_errors == 0", &t);
        assert_eq!(v.outcome, Outcome::Fail);
        assert!(v.reason.contains(UNKNOWN_VALUE));
        assert_eq!(run("rule r: smart.media_errors present", &t).outcome, Outcome::Pass);
    }

    #[test]
    fn absent_targets_skip_except_absent_operator() {
        let t = sample();
        assert_eq!(run("rule r: smart.temp_sensor_2 < 400", &t).outcome, Outcome::Skip);
        assert_eq!(run("rule r: smart.nothing == 1", &t).outcome, Outcome::Skip);
        assert_eq!(run("rule r: smart.temp_sensor_2 absent", &t).outcome, Outcome::Pass);
        assert_eq!(run("rule r: smart.nothing present", &t).outcome, Outcome::Fail);
        assert_eq!(run("rule r: vendor.*.bytes absent", &t).outcome, Outcome::Pass);
        assert_eq!(run("rule r: vendor.*.bytes present", &t).outcome, Outcome::Skip);
    }

    #[test]
    fn wildcard_expansion_and_binding() {
        let t = sample();
        let v = run("rule r: namespace.*.utilization_fraction <= 0.9", &t);
        assert_eq!(v.outcome, Outcome::Fail);
        assert_eq!(v.paths.len(), 2);
        assert_eq!(v.paths[0].as_str(), "namespace.1.utilization_fraction");
        assert!(v.reason.contains("namespace.1.utilization_fraction = 0.25 ratio <= 0.9"));
        let v = run("rule r: namespace.*.size_lba <= namespace.*.capacity_lba", &t);
        assert_eq!(v.outcome, Outcome::Fail);
        assert!(v.reason.contains("namespace.2.size_lba = 200"), "{}", v.reason);
    }

    #[test]
    fn pair_operators() {
        let before = sample();
        let after = tree(&[
            ("smart.power_on_hours", Value::Int(4010), Unit::Hours),
            ("controller.model_number", Value::Text("Acme".into()), Unit::Unitless),
        ]);
        let rules = RuleSet::parse(
            "rule model: controller.model_number unchanged\n\
             rule poh: smart.power_on_hours delta<= 5\n\
             rule poh_days: smart.power_on_hours delta<= 1 unit d\n\
             rule spare: smart.available_spare unchanged\n",
        )
        .unwrap();
        let single = verify(&after, &rules);
        assert!(single.iter().all(|v| v.outcome == Outcome::Skip));
        let pair = verify_pair(&before, &after, &rules);
        let outcomes: Vec<_> = pair.iter().map(|v| v.outcome).collect();
        assert_eq!(
            outcomes,
            [Outcome::Pass, Outcome::Fail, Outcome::Pass, Outcome::Fail]
        );
        assert_eq!(pair[1].observed[0].before, Some(Value::Int(4000)));
        assert!(pair[3].reason.contains("disappeared"));
    }

    #[test]
    fn verdicts_follow_rule_order() {
        let t = sample();
        let rules = RuleSet::parse("rule b: smart.x present\nrule a: smart.y absent").unwrap();
        let names: Vec<_> = verify(&t, &rules).into_iter().map(|v| v.rule).collect();
        assert_eq!(names, ["b", "a"]);
    }
}
