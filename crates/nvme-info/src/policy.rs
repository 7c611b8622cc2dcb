// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Static compare-policy classification with a per-deployment override table.
//!
//! Counters that only move forward are `monotonic`; sensor readings, capture
//! metadata and projections are `ignore`; everything else is `compare`. A
//! pattern also classifies every path beneath it. The last matching entry
//! wins, so overrides appended after the static table take precedence.

use std::collections::BTreeMap;

use crate::path::{FieldPath, PathPattern};
use crate::value::ComparePolicy;

const MONOTONIC: &[&str] = &[
    "smart.data_units_read",
    "smart.data_units_written",
    "smart.data_read_bytes",
    "smart.data_written_bytes",
    "smart.data_read_gib",
    "smart.data_written_gib",
    "smart.data_written_tib",
    "smart.host_read_commands",
    "smart.host_write_commands",
    "smart.controller_busy_time",
    "smart.controller_busy_time_s",
    "smart.power_cycles",
    "smart.power_on_hours",
    "smart.power_on_days",
    "smart.unsafe_shutdowns",
    "smart.media_errors",
    "smart.error_log_entries",
    "smart.percentage_used",
    "smart.warning_composite_temp_time",
    "smart.critical_composite_temp_time",
    "smart.thermal_mgmt_temp1_transitions",
    "smart.thermal_mgmt_temp2_transitions",
    "smart.thermal_mgmt_temp1_time",
    "smart.thermal_mgmt_temp2_time",
    "thermal.throttle_time_s",
    "thermal.throttle_transitions",
    "selftest.failures",
    "error.entry_count",
];

const IGNORE: &[&str] = &[
    "host.timestamp",
    "host.probe_version",
    "host.hostname",
    "smart.composite_temp",
    "smart.composite_temp_c",
    "smart.throttle_fraction",
    "smart.busy_fraction",
    "thermal.max_sensor_c",
    "thermal.sensor_count",
    "wear",
    "namespace.*.utilization_lba",
    "namespace.*.utilization_bytes",
    "namespace.*.utilization_fraction",
    "selftest.current_operation",
    "selftest.current_completion",
    "telemetry.controller_data_generation",
    "error.entry",
];

/// Ordered pattern → policy table.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: Vec<(PathPattern, ComparePolicy)>,
}

impl PolicyTable {
    /// The built-in classification.
    pub fn standard() -> Self {
        let mut entries = Vec::new();
        for (names, policy) in [
            (MONOTONIC, ComparePolicy::Monotonic),
            (IGNORE, ComparePolicy::Ignore),
        ] {
            entries.extend(
                names
                    .iter()
                    .filter_map(|n| PathPattern::parse(n).ok())
                    .map(|p| (p, policy)),
            );
        }
        for i in 1..=8 {
            for suffix in ["", "_c"] {
                if let Ok(p) = PathPattern::parse(&format!("smart.temp_sensor_{i}{suffix}")) {
                    entries.push((p, ComparePolicy::Ignore));
                }
            }
        }
        Self { entries }
    }

    /// The built-in classification followed by `overrides`.
    pub fn with_overrides(overrides: &BTreeMap<PathPattern, ComparePolicy>) -> Self {
        let mut table = Self::standard();
        table
            .entries
            .extend(overrides.iter().map(|(p, policy)| (p.clone(), *policy)));
        table
    }

    /// Policy for `path`.
    pub fn classify(&self, path: &FieldPath) -> ComparePolicy {
        self.entries
            .iter()
            .rev()
            .find(|(p, _)| p.covers(path))
            .map_or(ComparePolicy::Compare, |(_, policy)| *policy)
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(table: &PolicyTable, path: &str) -> ComparePolicy {
        table.classify(&FieldPath::parse(path).unwrap())
    }

    #[test]
    fn static_classification() {
        let t = PolicyTable::standard();
        assert_eq!(classify(&t, "smart.power_on_hours"), ComparePolicy::Monotonic);
        assert_eq!(classify(&t, "smart.temp_sensor_3_c"), ComparePolicy::Ignore);
        assert_eq!(classify(&t, "wear.projected_life_days"), ComparePolicy::Ignore);
        assert_eq!(classify(&t, "error.entry[3].lba"), ComparePolicy::Ignore);
        assert_eq!(classify(&t, "controller.serial_number"), ComparePolicy::Compare);
        assert_eq!(
            classify(&t, "smart.critical_warning.temperature"),
            ComparePolicy::Compare
        );
    }

    #[test]
    fn overrides_win() {
        let mut o = BTreeMap::new();
        o.insert(PathPattern::parse("vendor.c0").unwrap(), ComparePolicy::Monotonic);
        o.insert(PathPattern::parse("smart.media_errors").unwrap(), ComparePolicy::Compare);
        let t = PolicyTable::with_overrides(&o);
        assert_eq!(classify(&t, "vendor.c0.bytes"), ComparePolicy::Monotonic);
        assert_eq!(classify(&t, "smart.media_errors"), ComparePolicy::Compare);
    }
}
