// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Built-in and user rule-sets evaluated over decoded fixture bundles.

use nvme_dry_tests::{BundleBuilder, IdentifyControllerBuilder, NamespaceBuilder, SmartLogBuilder};
use nvme_info::{decode, BlockId, InfoTree, Value};
use nvme_rules::{
    verify, verify_pair, Outcome, ParseErrorKind, Position, RuleSet, Severity, Verdict,
    VerdictSummary,
};

fn healthy() -> InfoTree {
    decode(&BundleBuilder::healthy().snapshot()).unwrap()
}

fn with_smart(smart: SmartLogBuilder) -> InfoTree {
    decode(&BundleBuilder::healthy().smart(smart.build()).snapshot()).unwrap()
}

fn named<'v>(verdicts: &'v [Verdict], name: &str) -> &'v Verdict {
    verdicts
        .iter()
        .find(|v| v.rule == name)
        .unwrap_or_else(|| panic!("no verdict for {name}"))
}

#[test]
fn healthy_drive_passes_every_health_rule() {
    let verdicts = verify(&healthy(), &RuleSet::health());
    assert!(!verdicts.is_empty());
    for v in &verdicts {
        assert_eq!(v.outcome, Outcome::Pass, "{}: {}", v.rule, v.reason);
    }
    let summary = VerdictSummary::of(&verdicts);
    assert_eq!(summary.passed, verdicts.len());
    assert_eq!(summary.exit_code(), 0);
}

#[test]
fn health_rules_skip_pair_operators_and_changes_need_a_pair() {
    let verdicts = verify(&healthy(), &RuleSet::changes());
    assert!(verdicts.iter().all(|v| v.outcome == Outcome::Skip));
    assert!(verdicts[0].reason.contains("before/after pair"));
    assert_eq!(VerdictSummary::of(&verdicts).exit_code(), 0);
}

#[test]
fn critical_warning_and_spare_failures() {
    let tree = with_smart(SmartLogBuilder::new().critical_warning(0x05).spare(5, 10));
    let verdicts = verify(&tree, &RuleSet::health());
    let warning = named(&verdicts, "no_critical_warning");
    assert_eq!(warning.outcome, Outcome::Fail);
    assert_eq!(warning.observed[0].value, Value::Int(5));
    let spare = named(&verdicts, "spare_above_threshold");
    assert_eq!(spare.outcome, Outcome::Fail);
    assert!(
        spare.reason.contains("smart.available_spare_threshold (10 %)"),
        "{}",
        spare.reason
    );
    assert_eq!(VerdictSummary::of(&verdicts).exit_code(), 1);
}

#[test]
fn hot_drive_fails_thermal_rules_with_warn_severity() {
    let tree = with_smart(SmartLogBuilder::new().composite_temp(363));
    let verdicts = verify(&tree, &RuleSet::health());
    let range = named(&verdicts, "composite_temp_in_range");
    assert_eq!(range.outcome, Outcome::Fail);
    assert_eq!(range.severity, Severity::Warn);
    assert!(range.reason.contains("90 °C outside 0..70"), "{}", range.reason);
    assert_eq!(named(&verdicts, "below_warning_temp").outcome, Outcome::Fail);
    assert!(range.is_fatal());
}

#[test]
fn missing_sensor_is_skipped() {
    let tree = with_smart(SmartLogBuilder::new().composite_temp(0));
    let verdicts = verify(&tree, &RuleSet::health());
    assert_eq!(named(&verdicts, "composite_temp_in_range").outcome, Outcome::Skip);
}

#[test]
fn info_failures_are_reported_but_not_fatal() {
    let ns = NamespaceBuilder::new().blocks(100, 100, 150).build();
    let snapshot = BundleBuilder::healthy()
        .block(BlockId::IdentifyNamespace(1), ns)
        .snapshot();
    let verdicts = verify(&decode(&snapshot).unwrap(), &RuleSet::health());
    let util = named(&verdicts, "namespace_utilization");
    assert_eq!(util.outcome, Outcome::Fail);
    assert_eq!(util.severity, Severity::Info);
    assert_eq!(util.paths[0].as_str(), "namespace.1.utilization_fraction");
    assert_eq!(VerdictSummary::of(&verdicts).exit_code(), 0);
}

#[test]
fn drift_between_identical_snapshots_passes() {
    let before = healthy();
    let after = with_smart(SmartLogBuilder::new().power_on_hours(4100).power_cycles(151));
    let verdicts = verify_pair(&before, &after, &RuleSet::changes());
    for v in &verdicts {
        assert_eq!(v.outcome, Outcome::Pass, "{}: {}", v.rule, v.reason);
    }
}

#[test]
fn regression_between_snapshots_fails() {
    let before = healthy();
    let after = decode(
        &BundleBuilder::healthy()
            .controller(IdentifyControllerBuilder::new().firmware("2B2QEXM7").build())
            .smart(SmartLogBuilder::new().media_errors(3).unsafe_shutdowns(14).build())
            .snapshot(),
    )
    .unwrap();
    let verdicts = verify_pair(&before, &after, &RuleSet::changes());
    let fw = named(&verdicts, "firmware_unchanged");
    assert_eq!(fw.outcome, Outcome::Fail);
    assert_eq!(fw.severity, Severity::Warn);
    assert!(fw.reason.contains(r#""1B2QEXM7" -> "2B2QEXM7""#), "{}", fw.reason);
    assert_eq!(fw.observed[0].before, Some(Value::Text("1B2QEXM7".into())));
    let media = named(&verdicts, "no_new_media_errors");
    assert_eq!(media.outcome, Outcome::Fail);
    let shutdowns = named(&verdicts, "no_new_unsafe_shutdowns");
    assert_eq!(shutdowns.outcome, Outcome::Fail);
    assert!(shutdowns.reason.contains("moved by 2"), "{}", shutdowns.reason);
    assert_eq!(named(&verdicts, "serial_unchanged").outcome, Outcome::Pass);
}

#[test]
fn user_rules_merge_with_builtins() {
    let user = RuleSet::parse(
        "[site]\n\
         rule cool_enough: smart.composite_temp <= 45 unit °C\n\
         rule model: controller.model_number == \"Dry Run NVMe 1TB\"\n\
         rule poh_years: smart.power_on_hours < 1 unit y severity warn\n",
    )
    .unwrap();
    let rules = RuleSet::health().merged(user).unwrap();
    let verdicts = verify(&healthy(), &rules);
    assert_eq!(verdicts.len(), rules.len());
    for name in ["cool_enough", "model", "poh_years"] {
        let v = named(&verdicts, name);
        assert_eq!(v.outcome, Outcome::Pass, "{name}: {}", v.reason);
        assert_eq!(v.group.as_deref(), Some("site"));
    }
}

#[test]
fn write_rate_coerces_only_to_its_own_unit() {
    let user = RuleSet::parse(
        "rule light_writer: wear.data_written_gib_per_day < 100 unit GiB/d\n\
         rule rate_as_size: wear.data_written_gib_per_day < 100 unit GiB\n",
    )
    .unwrap();
    let verdicts = verify(&healthy(), &user);
    let rate = named(&verdicts, "light_writer");
    assert_eq!(rate.outcome, Outcome::Pass, "{}", rate.reason);
    assert!(rate.reason.contains("GiB/d"), "{}", rate.reason);
    let size = named(&verdicts, "rate_as_size");
    assert_eq!(size.outcome, Outcome::Fail);
    assert!(size.reason.contains("unit-incompatible"), "{}", size.reason);
}

#[test]
fn duplicate_user_rule_is_rejected_with_position() {
    let user = RuleSet::parse("\n\nrule selftest_clean: selftest.failures == 0\n").unwrap();
    let err = RuleSet::health().merged(user).unwrap_err();
    assert_eq!(err.position, Position::new(3, 1));
    assert_eq!(
        err.kind,
        ParseErrorKind::DuplicateRule("selftest_clean".into())
    );
}

#[test]
fn verdicts_serialize_for_reports() {
    let verdicts = verify(&healthy(), &RuleSet::health());
    let json = serde_json::to_value(&verdicts[0]).unwrap();
    assert_eq!(json["rule"], "no_critical_warning");
    assert_eq!(json["outcome"], "pass");
    assert_eq!(json["severity"], "fail");
    assert_eq!(json["group"], "health");
}
