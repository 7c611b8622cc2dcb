// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Second-order fields computed over a fully decoded tree.
//!
//! Derivations only append. A derived field whose sources are missing is not
//! emitted; when a source is `unknown` or `absent` the derived field carries
//! the same state. Every derived field lists the paths it consumed.

use tracing::{debug, trace, warn};

use crate::config::AnalysisConfig;
use crate::path::FieldPath;
use crate::policy::PolicyTable;
use crate::tree::InfoTree;
use crate::units::{Unit, DATA_UNIT_BYTES, HOURS_PER_YEAR, KELVIN_OFFSET};
use crate::value::{DisplayHint, Field, Provenance, Value};

const GIB: f64 = 1_073_741_824.0;
const TIB: f64 = 1_099_511_627_776.0;
const DAYS_PER_YEAR: f64 = 365.25;
const TB: f64 = 1e12;

const OVERFLOW: &str = "value exceeds 128 bits";

/// State of one derivation input.
#[derive(Debug, Clone, Copy)]
enum Input {
    Missing,
    Unknown,
    Absent,
    Int(u128),
    Real(f64),
}

impl Input {
    fn real(self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(v as f64),
            Self::Real(v) => Some(v),
            _ => None,
        }
    }
}

/// Outcome of combining inputs before the arithmetic runs.
enum Gate<T> {
    Skip,
    Carry(Value),
    Ready(Vec<T>),
}

struct Deriver<'c> {
    tree: InfoTree,
    policies: PolicyTable,
    config: &'c AnalysisConfig,
    added: usize,
}

impl Deriver<'_> {
    fn input(&self, path: &str) -> Input {
        match self.tree.value(path) {
            None => Input::Missing,
            Some(Value::Unknown) => Input::Unknown,
            Some(Value::Absent) => Input::Absent,
            Some(Value::Int(v)) => Input::Int(*v),
            Some(Value::Real(v)) => Input::Real(*v),
            Some(other) => {
                debug!(path, kind = other.kind(), "non-numeric derivation input");
                Input::Unknown
            }
        }
    }

    fn gate<T>(&self, sources: &[&str], pick: impl Fn(Input) -> Option<T>) -> Gate<T> {
        let inputs: Vec<Input> = sources.iter().map(|s| self.input(s)).collect();
        if inputs.iter().any(|i| matches!(i, Input::Missing)) {
            return Gate::Skip;
        }
        if inputs.iter().any(|i| matches!(i, Input::Unknown)) {
            return Gate::Carry(Value::Unknown);
        }
        if inputs.iter().any(|i| matches!(i, Input::Absent)) {
            return Gate::Carry(Value::Absent);
        }
        match inputs.into_iter().map(pick).collect::<Option<Vec<T>>>() {
            Some(values) => Gate::Ready(values),
            None => Gate::Carry(Value::Unknown),
        }
    }

    fn emit(
        &mut self,
        path: &str,
        derivation: &str,
        sources: &[&str],
        field: impl FnOnce(Provenance) -> Field,
    ) {
        let (Ok(target), Ok(sources)) = (
            FieldPath::parse(path),
            sources
                .iter()
                .map(|s| FieldPath::parse(s))
                .collect::<Result<Vec<_>, _>>(),
        ) else {
            debug!(path, "skipping derivation with an invalid path");
            return;
        };
        if self.tree.contains(&target) {
            debug!(path, "derived path already decoded; keeping decoded field");
            return;
        }
        let provenance = Provenance::Derived {
            derivation: derivation.to_owned(),
            sources,
            error: None,
        };
        let policy = self.policies.classify(&target);
        trace!(path, derivation, "derived field");
        self.tree.insert_new(target, field(provenance).with_policy(policy));
        self.added += 1;
    }

    /// Real-valued derivation; `f` returning `None` yields `absent`.
    fn real(
        &mut self,
        path: &str,
        derivation: &str,
        sources: &[&str],
        unit: Unit,
        hint: DisplayHint,
        f: impl FnOnce(&[f64]) -> Option<f64>,
    ) {
        let value = match self.gate(sources, Input::real) {
            Gate::Skip => return,
            Gate::Carry(v) => v,
            Gate::Ready(xs) => f(&xs).map_or(Value::Absent, Value::Real),
        };
        self.emit(path, derivation, sources, |p| {
            Field::new(value, unit, p).with_hint(hint)
        });
    }

    /// Integer-valued derivation; `f` returning `None` means the checked
    /// arithmetic overflowed and yields `unknown`.
    fn int(
        &mut self,
        path: &str,
        derivation: &str,
        sources: &[&str],
        unit: Unit,
        f: impl FnOnce(&[u128]) -> Option<u128>,
    ) {
        let pick = |i: Input| match i {
            Input::Int(v) => Some(v),
            _ => None,
        };
        let value = match self.gate(sources, pick) {
            Gate::Skip => return,
            Gate::Carry(v) => v,
            Gate::Ready(xs) => match f(&xs) {
                Some(v) => Value::Int(v),
                None => {
                    warn!(path, derivation, "derived integer overflowed");
                    self.emit(path, derivation, sources, |p| {
                        Field::unknown(unit, p, OVERFLOW).with_hint(DisplayHint::GROUPED)
                    });
                    return;
                }
            },
        };
        self.emit(path, derivation, sources, |p| {
            Field::new(value, unit, p).with_hint(DisplayHint::GROUPED)
        });
    }

    fn temperatures(&mut self) {
        let kelvin: Vec<String> = self
            .tree
            .iter()
            .filter(|(_, f)| f.unit() == Unit::Kelvin)
            .map(|(p, _)| p.as_str().to_owned())
            .collect();
        for path in kelvin {
            self.real(
                &format!("{path}_c"),
                "kelvin_to_celsius",
                &[path.as_str()],
                Unit::Celsius,
                DisplayHint::decimals(1),
                |x| Some(x[0] - KELVIN_OFFSET),
            );
        }
    }

    fn smart(&mut self) {
        for dir in ["read", "written"] {
            let units = format!("smart.data_units_{dir}");
            self.int(
                &format!("smart.data_{dir}_bytes"),
                "data_units_to_bytes",
                &[units.as_str()],
                Unit::Bytes,
                |x| x[0].checked_mul(DATA_UNIT_BYTES),
            );
            self.real(
                &format!("smart.data_{dir}_gib"),
                "data_units_to_gib",
                &[units.as_str()],
                Unit::GiB,
                DisplayHint::decimals(2),
                |x| Some(x[0] * DATA_UNIT_BYTES as f64 / GIB),
            );
        }
        self.real(
            "smart.data_written_tib",
            "data_units_to_tib",
            &["smart.data_units_written"],
            Unit::TiB,
            DisplayHint::decimals(3),
            |x| Some(x[0] * DATA_UNIT_BYTES as f64 / TIB),
        );
        self.int(
            "smart.controller_busy_time_s",
            "minutes_to_seconds",
            &["smart.controller_busy_time"],
            Unit::Seconds,
            |x| x[0].checked_mul(60),
        );
        self.real(
            "smart.power_on_days",
            "hours_to_days",
            &["smart.power_on_hours"],
            Unit::Days,
            DisplayHint::decimals(2),
            |x| Some(x[0] / 24.0),
        );
        for (path, numerator) in [
            ("smart.throttle_fraction", "smart.warning_composite_temp_time"),
            ("smart.busy_fraction", "smart.controller_busy_time"),
        ] {
            self.real(
                path,
                "minutes_over_power_on_minutes",
                &[numerator, "smart.power_on_hours"],
                Unit::Ratio,
                DisplayHint::decimals(4),
                |x| {
                    let on_minutes = x[1] * 60.0;
                    (on_minutes > 0.0).then(|| (x[0] / on_minutes).clamp(0.0, 1.0))
                },
            );
        }
    }

    fn wear(&mut self) {
        self.real(
            "wear.percent_used_per_power_on_day",
            "percentage_used_per_day",
            &["smart.percentage_used", "smart.power_on_days"],
            Unit::PercentPerDay,
            DisplayHint::decimals(4),
            |x| Some(x[0] / x[1].max(1.0)),
        );
        self.real(
            "wear.projected_life_days",
            "remaining_life",
            &["smart.percentage_used", "wear.percent_used_per_power_on_day"],
            Unit::Days,
            DisplayHint::decimals(0),
            |x| (x[1] > 0.0).then(|| ((100.0 - x[0]) / x[1]).max(0.0)),
        );
        self.real(
            "wear.projected_life_years",
            "days_to_years",
            &["wear.projected_life_days"],
            Unit::Years,
            DisplayHint::decimals(2),
            |x| Some(x[0] / DAYS_PER_YEAR),
        );
        self.real(
            "wear.data_written_gib_per_day",
            "data_written_per_day",
            &["smart.data_written_gib", "smart.power_on_days"],
            Unit::GibPerDay,
            DisplayHint::decimals(2),
            |x| Some(x[0] / x[1].max(1.0)),
        );

        let rating = self.config.rating;
        if let Some(tbw) = rating.tbw_tb.filter(|t| *t > 0.0) {
            self.real(
                "wear.tbw_used_fraction",
                "written_over_rated_tbw",
                &["smart.data_written_bytes"],
                Unit::Ratio,
                DisplayHint::decimals(4),
                |x| Some(x[0] / (tbw * TB)),
            );
        }
        if let Some(years) = rating.warranty_years.filter(|y| *y > 0.0) {
            self.real(
                "wear.warranty_used_fraction",
                "power_on_over_warranty",
                &["smart.power_on_hours"],
                Unit::Ratio,
                DisplayHint::decimals(4),
                |x| Some(x[0] / (years * HOURS_PER_YEAR)),
            );
        }
        if let Some(limit) = rating.throttle_percent_limit {
            let value = match self.gate(&["smart.throttle_fraction"], Input::real) {
                Gate::Skip => return,
                Gate::Carry(v) => v,
                Gate::Ready(x) => Value::Bool(x[0] * 100.0 > limit),
            };
            self.emit(
                "wear.throttle_over_limit",
                "throttle_over_rated_limit",
                &["smart.throttle_fraction"],
                |p| Field::new(value, Unit::Unitless, p),
            );
        }
    }

    fn namespaces(&mut self) {
        let ids: Vec<String> = self
            .tree
            .paths()
            .filter_map(|p| {
                let mut segs = p.segments();
                match (segs.next(), segs.next(), segs.next()) {
                    (Some("namespace"), Some(id), Some("size_bytes")) if segs.next().is_none() => {
                        Some(id.to_owned())
                    }
                    _ => None,
                }
            })
            .collect();
        for id in ids {
            let ns = format!("namespace.{id}");
            let used = format!("{ns}.utilization_lba");
            let capacity = format!("{ns}.capacity_lba");
            self.real(
                &format!("{ns}.utilization_fraction"),
                "utilization_over_capacity",
                &[used.as_str(), capacity.as_str()],
                Unit::Ratio,
                DisplayHint::decimals(4),
                |x| (x[1] > 0.0).then(|| x[0] / x[1]),
            );
            let size = format!("{ns}.size_bytes");
            self.real(
                &format!("{ns}.size_gib"),
                "bytes_to_gib",
                &[size.as_str()],
                Unit::GiB,
                DisplayHint::decimals(2),
                |x| Some(x[0] / GIB),
            );
            self.real(
                &format!("{ns}.size_tib"),
                "bytes_to_tib",
                &[size.as_str()],
                Unit::TiB,
                DisplayHint::decimals(3),
                |x| Some(x[0] / TIB),
            );
        }
    }

    fn thermal(&mut self) {
        let sensors: Vec<String> = (1..=8)
            .map(|i| format!("smart.temp_sensor_{i}_c"))
            .filter(|p| self.tree.lookup(p).is_some())
            .collect();
        if !sensors.is_empty() {
            let readings: Vec<f64> = sensors
                .iter()
                .filter_map(|p| self.tree.value(p).and_then(Value::as_f64))
                .collect();
            let refs: Vec<&str> = sensors.iter().map(String::as_str).collect();
            let count = readings.len() as u128;
            let max = readings.iter().copied().reduce(f64::max);
            self.emit("thermal.sensor_count", "reporting_sensors", &refs, |p| {
                Field::new(Value::Int(count), Unit::Count, p)
            });
            self.emit("thermal.max_sensor_c", "max_sensor", &refs, |p| {
                Field::new(max.map_or(Value::Absent, Value::Real), Unit::Celsius, p)
                    .with_hint(DisplayHint::decimals(1))
            });
        }
        self.int(
            "thermal.throttle_time_s",
            "sum_thermal_management_time",
            &["smart.thermal_mgmt_temp1_time", "smart.thermal_mgmt_temp2_time"],
            Unit::Seconds,
            |x| x[0].checked_add(x[1]),
        );
        self.int(
            "thermal.throttle_transitions",
            "sum_thermal_management_transitions",
            &[
                "smart.thermal_mgmt_temp1_transitions",
                "smart.thermal_mgmt_temp2_transitions",
            ],
            Unit::Count,
            |x| x[0].checked_add(x[1]),
        );
    }
}

/// Extend a decoded tree with derived fields.
///
/// Decoded fields are never replaced; derived fields are appended after them.
pub fn derive(tree: InfoTree, config: &AnalysisConfig) -> InfoTree {
    let mut d = Deriver {
        tree,
        policies: PolicyTable::with_overrides(&config.compare_overrides),
        config,
        added: 0,
    };
    d.temperatures();
    d.smart();
    d.wear();
    d.namespaces();
    d.thermal();
    debug!(derived = d.added, "derivation complete");
    d.tree
}
