// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property tests: the parser never panics and the verifier is total.

use nvme_dry_tests::{BundleBuilder, SmartLogBuilder};
use nvme_info::decode;
use nvme_rules::{verify, verify_pair, RuleSet};
use proptest::prelude::*;

const TARGETS: &[&str] = &[
    "smart.composite_temp",
    "smart.available_spare",
    "smart.media_errors",
    "controller.model_number",
    "controller.controller_type",
    "namespace.*.size_lba",
    "smart.temp_sensor_8",
    "nowhere.at_all",
];

const CHECKS: &[&str] = &[
    "== 0",
    "!= io",
    "< smart.available_spare_threshold",
    ">= namespace.*.capacity_lba",
    "<= \"text\"",
    "in-range *..70",
    "in-range 0 .. 1",
    "present",
    "absent",
    "unchanged",
    "delta<= 3",
];

const OPTIONS: &[&str] = &["", " unit °C", " unit h", " unit GiB", " severity info"];

fn rule_line() -> impl Strategy<Value = String> {
    (
        prop::sample::select(TARGETS),
        prop::sample::select(CHECKS),
        prop::sample::select(OPTIONS),
    )
        .prop_map(|(t, c, o)| format!("{t} {c}{o}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn parser_never_panics(src in "\\PC{0,120}") {
        let _ = RuleSet::parse(&src);
    }

    #[test]
    fn every_rule_yields_one_verdict(
        lines in prop::collection::vec(rule_line(), 1..12),
        poh in 0u128..100_000,
        temp in 0u16..400,
    ) {
        let src: String = lines
            .iter()
            .enumerate()
            .map(|(i, l)| format!("rule r{i}: {l}\n"))
            .collect();
        let rules = RuleSet::parse(&src).unwrap();
        let before = decode(&BundleBuilder::healthy().snapshot()).unwrap();
        let after = decode(
            &BundleBuilder::healthy()
                .smart(SmartLogBuilder::new().power_on_hours(poh).composite_temp(temp).build())
                .snapshot(),
        )
        .unwrap();

        let single = verify(&after, &rules);
        prop_assert_eq!(single.len(), rules.len());
        let pair = verify_pair(&before, &after, &rules);
        prop_assert_eq!(pair.len(), rules.len());
        for (v, r) in pair.iter().zip(rules.iter()) {
            prop_assert_eq!(&v.rule, &r.name);
            prop_assert!(!v.reason.is_empty());
        }
        prop_assert_eq!(verify(&after, &rules), single);
    }
}
