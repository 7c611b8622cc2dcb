// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Property tests for decoder determinism and totality and for the differ laws.

use nvme_dry_tests::{BundleBuilder, SmartLogBuilder};
use nvme_info::{
    decode, decode_primary, diff, BlockId, ChangeKind, ComparePolicy, Field, FieldPath, InfoTree,
    PolicyTable, Provenance, TreeBuilder, Unit, Value,
};
use proptest::prelude::*;

fn any_block_id() -> impl Strategy<Value = BlockId> {
    prop_oneof![
        Just(BlockId::IdentifyController),
        (1u32..4).prop_map(BlockId::IdentifyNamespace),
        Just(BlockId::Smart),
        Just(BlockId::ErrorLog),
        Just(BlockId::FirmwareSlot),
        prop::sample::select(vec![0x01u8, 0x02, 0x04, 0x05, 0x06, 0x07, 0x08, 0x0b, 0x81, 0xc0])
            .prop_map(BlockId::Feature),
        Just(BlockId::SelftestLog),
        Just(BlockId::TelemetryHeader),
        Just(BlockId::Vendor("c0".to_owned())),
    ]
}

fn tree(entries: &[(String, u8, ComparePolicy)]) -> InfoTree {
    let mut b = TreeBuilder::new();
    for (path, value, policy) in entries {
        let Ok(path) = FieldPath::parse(path) else {
            continue;
        };
        if b.contains(&path) {
            continue;
        }
        let value = if *value == 0 {
            Value::Unknown
        } else {
            Value::Int(u128::from(*value))
        };
        let field = Field::new(value, Unit::Count, Provenance::block(&BlockId::Smart, 0, 1))
            .with_policy(*policy);
        b.insert(path, field).unwrap();
    }
    b.finish()
}

fn entries(policy: ComparePolicy) -> impl Strategy<Value = Vec<(String, u8, ComparePolicy)>> {
    prop::collection::vec(("smart\\.[a-d]{1,2}", 0u8..4, Just(policy)), 0..12)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_block_bytes_never_panic(
        id in any_block_id(),
        bytes in prop::collection::vec(any::<u8>(), 0..4200),
    ) {
        let snapshot = BundleBuilder::healthy().block(id, bytes).snapshot();
        if let Ok(tree) = decode(&snapshot) {
            for (path, field) in tree.iter() {
                prop_assert!(!field.provenance().is_empty(), "{path} lacks provenance");
            }
        }
    }

    #[test]
    fn decode_is_deterministic(smart in prop::collection::vec(any::<u8>(), 512)) {
        let snapshot = BundleBuilder::healthy().smart(smart).snapshot();
        let a = serde_json::to_string(&decode(&snapshot).unwrap()).unwrap();
        let b = serde_json::to_string(&decode(&snapshot).unwrap()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn derived_fields_only_append(
        used in 0u8..=255,
        poh in 0u128..200_000,
        written in any::<u64>(),
    ) {
        let smart = SmartLogBuilder::new()
            .percentage_used(used)
            .power_on_hours(poh)
            .data_units_written(u128::from(written))
            .build();
        let snapshot = BundleBuilder::healthy().smart(smart).snapshot();
        let primary = decode_primary(&snapshot, &PolicyTable::standard()).unwrap();
        let full = decode(&snapshot).unwrap();
        prop_assert!(full.len() >= primary.len());
        for ((pp, pf), (fp, ff)) in primary.iter().zip(full.iter()) {
            prop_assert_eq!(pp, fp);
            prop_assert_eq!(pf, ff);
        }
    }

    #[test]
    fn diff_with_self_is_empty(a in entries(ComparePolicy::Compare)) {
        let t = tree(&a);
        prop_assert!(diff(&t, &t).is_empty());
    }

    #[test]
    fn diff_is_symmetric_for_compare_fields(
        a in entries(ComparePolicy::Compare),
        b in entries(ComparePolicy::Compare),
    ) {
        let (ta, tb) = (tree(&a), tree(&b));
        prop_assert_eq!(diff(&ta, &tb).reversed(), diff(&tb, &ta));
    }

    #[test]
    fn monotonic_reports_iff_decreased(before in any::<u64>(), after in any::<u64>()) {
        let mk = |v: u64| {
            let mut b = TreeBuilder::new();
            b.insert(
                FieldPath::parse("smart.power_on_hours").unwrap(),
                Field::new(
                    Value::Int(u128::from(v)),
                    Unit::Hours,
                    Provenance::block(&BlockId::Smart, 128, 144),
                )
                .with_policy(ComparePolicy::Monotonic),
            )
            .unwrap();
            b.finish()
        };
        let changes = diff(&mk(before), &mk(after));
        prop_assert_eq!(!changes.is_empty(), after < before);
        if let Some(change) = changes.iter().next() {
            prop_assert_eq!(change.kind, ChangeKind::Changed);
        }
    }
}
