// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Human-readable tables.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use nvme_info::{ChangeSet, InfoTree, Sample, Value};
use nvme_rules::Verdict;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(header.to_vec());
    table
}

fn sample(s: Option<&Sample>) -> String {
    let Some(s) = s else {
        return "-".to_owned();
    };
    let body = match &s.value {
        Value::Int(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Text(v) | Value::Enum(v) => v.clone(),
        Value::Bytes(v) => v.iter().map(|b| format!("{b:02x}")).collect(),
        other => return other.kind().to_owned(),
    };
    if s.unit.is_displayed() {
        format!("{body} {}", s.unit)
    } else {
        body
    }
}

/// One row per field, in decode order.
pub(crate) fn tree_table(tree: &InfoTree) -> String {
    let mut t = table(&["path", "value", "source"]);
    for (path, field) in tree.iter() {
        t.add_row(vec![
            path.to_string(),
            field.display_value(),
            field.provenance().to_string(),
        ]);
    }
    t.to_string()
}

pub(crate) fn verdict_table(verdicts: &[Verdict]) -> String {
    let mut t = table(&["rule", "severity", "outcome", "reason"]);
    for v in verdicts {
        t.add_row(vec![
            v.rule.clone(),
            v.severity.to_string(),
            v.outcome.to_string().to_uppercase(),
            v.reason.clone(),
        ]);
    }
    t.to_string()
}

pub(crate) fn change_table(changes: &ChangeSet) -> String {
    let mut t = table(&["path", "change", "before", "after", "policy"]);
    for c in changes {
        t.add_row(vec![
            c.path.to_string(),
            c.kind.to_string(),
            sample(c.before.as_ref()),
            sample(c.after.as_ref()),
            c.policy.to_string(),
        ]);
    }
    t.to_string()
}
