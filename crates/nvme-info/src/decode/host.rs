// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `host.*` from the manifest and the `host.txt` addendum.

use super::Sink;
use crate::snapshot::Snapshot;
use crate::units::Unit;
use crate::value::{Field, Provenance, Value};

/// Keys surfaced from `host.txt`.
const ADDENDUM_KEYS: &[&str] = &["driver", "os_path"];

fn text(value: &str, provenance: Provenance) -> Field {
    let value = value.trim();
    if value.is_empty() {
        Field::new(Value::Absent, Unit::Unitless, provenance)
    } else {
        Field::new(Value::Text(value.to_owned()), Unit::Unitless, provenance)
    }
}

fn manifest(key: &str) -> Provenance {
    Provenance::Manifest { key: key.to_owned() }
}

/// Parse `key: value` lines; later duplicates win.
pub(crate) fn parse_host_txt(contents: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for line in contents.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let value = value.trim().to_owned();
        match out.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => out.push((key, value)),
        }
    }
    out
}

pub(super) fn decode(snapshot: &Snapshot, sink: &mut Sink<'_>) {
    let m = snapshot.manifest();
    let host = &m.host;
    for (key, value) in [
        ("os_name", &host.os_name),
        ("os_version", &host.os_version),
        ("hostname", &host.hostname),
        ("driver", &host.driver),
    ] {
        if let Some(v) = value {
            sink.put(&format!("host.{key}"), text(v, manifest(&format!("host.{key}"))));
        }
    }
    sink.put(
        "host.probe_version",
        text(&m.probe_version, manifest("probe_version")),
    );
    sink.put(
        "host.timestamp",
        text(&m.timestamp_iso8601, manifest("timestamp_iso8601")),
    );
    sink.put(
        "host.drive_index",
        Field::new(
            Value::Int(u128::from(m.drive_index)),
            Unit::Unitless,
            manifest("drive_index"),
        ),
    );
    if let Some(contents) = &snapshot.addenda().host_txt {
        for (key, value) in parse_host_txt(contents) {
            if ADDENDUM_KEYS.contains(&key.as_str()) {
                sink.put(
                    &format!("host.addendum.{key}"),
                    text(
                        &value,
                        Provenance::Addendum {
                            file: "host.txt".to_owned(),
                        },
                    ),
                );
            }
        }
    }
}
