// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Get Features completion dwords, one block per feature identifier.

use super::reader::Block;
use super::{require, Sink};
use crate::error::DecodeError;
use crate::units::Unit;
use crate::value::{DisplayHint, Field, Value};

const THRESHOLD_TYPE: &[(u128, &str)] = &[(0, "over"), (1, "under")];

const AEN: &[(u32, &str)] = &[
    (8, "namespace_attribute"),
    (9, "firmware_activation"),
    (10, "telemetry"),
    (11, "ana_change"),
];

/// Human name of a feature identifier, used as the path segment.
pub(crate) fn feature_name(fid: u8) -> String {
    match fid {
        0x01 => "arbitration".into(),
        0x02 => "power_management".into(),
        0x04 => "temperature_threshold".into(),
        0x05 => "error_recovery".into(),
        0x06 => "volatile_write_cache".into(),
        0x07 => "number_of_queues".into(),
        0x08 => "interrupt_coalescing".into(),
        0x09 => "interrupt_vector_config".into(),
        0x0a => "write_atomicity".into(),
        0x0b => "async_event_config".into(),
        0x0c => "autonomous_power_state".into(),
        0x10 => "thermal_management".into(),
        0x81 => "host_identifier".into(),
        other => format!("fid_{other:02x}"),
    }
}

fn plus_one(v: u128) -> Value {
    Value::Int(v + 1)
}

pub(super) fn decode(fid: u8, block: &Block<'_>, sink: &mut Sink<'_>) -> Result<(), DecodeError> {
    let name = feature_name(fid);
    let p = |leaf: &str| format!("feature.{name}.{leaf}");
    if fid == 0x81 {
        // Host Identifier is returned in a data buffer (8 or 16 bytes).
        let field = if block.len() < 8 {
            Field::unknown(
                Unit::Unitless,
                block.prov(0, block.len()),
                format!("host identifier needs 8 or 16 bytes, got {}", block.len()),
            )
        } else {
            block.raw(0, block.len().min(16), false)
        };
        sink.put(&p("value"), field);
        return Ok(());
    }
    require(block, 4)?;
    sink.put(&p("_raw"), block.hex(0, 4));
    match fid {
        0x01 => {
            sink.put(
                &p("burst"),
                block.int_with(0, 4, Unit::Count, |v| match v & 0x07 {
                    0x07 => Value::Absent,
                    ab => Value::Int(1 << ab),
                }),
            );
            for (name, shift) in [("low", 8), ("medium", 16), ("high", 24)] {
                sink.put(
                    &p(&format!("{name}_priority_weight")),
                    block.int_with(0, 4, Unit::Count, |v| plus_one((v >> shift) & 0xff)),
                );
            }
        }
        0x02 => {
            sink.put(&p("power_state"), block.bits(0, 4, 0, 4, Unit::Unitless));
            sink.put(&p("workload_hint"), block.bits(0, 4, 5, 7, Unit::Unitless));
        }
        0x04 => {
            sink.put(
                &p("threshold"),
                block.int_with(0, 4, Unit::Kelvin, |v| match v & 0xffff {
                    0 => Value::Absent,
                    k => Value::Int(k),
                }),
            );
            sink.put(&p("sensor"), block.bits(0, 4, 16, 19, Unit::Unitless));
            sink.put(&p("type"), block.symbol(0, 4, 20, 21, THRESHOLD_TYPE));
        }
        0x05 => {
            sink.put(
                &p("time_limit"),
                block.int_with(0, 4, Unit::Millis, |v| Value::Int((v & 0xffff) * 100)),
            );
            sink.put(&p("deallocated_error"), block.flag(0, 4, 16));
        }
        0x06 => sink.put(&p("enabled"), block.flag(0, 4, 0)),
        0x07 => {
            sink.put(&p("submission"), block.int_with(0, 4, Unit::Count, |v| plus_one(v & 0xffff)));
            sink.put(&p("completion"), block.int_with(0, 4, Unit::Count, |v| plus_one(v >> 16)));
        }
        0x08 => {
            sink.put(&p("threshold"), block.int_with(0, 4, Unit::Count, |v| plus_one(v & 0xff)));
            sink.put(
                &p("time"),
                block.int_with(0, 4, Unit::Micros, |v| Value::Int(((v >> 8) & 0xff) * 100)),
            );
        }
        0x09 => {
            sink.put(&p("vector"), block.bits(0, 4, 0, 15, Unit::Unitless));
            sink.put(&p("coalescing_disable"), block.flag(0, 4, 16));
        }
        0x0a => sink.put(&p("disable_normal"), block.flag(0, 4, 0)),
        0x0b => {
            sink.put(
                &p("smart_warnings"),
                block.bits(0, 4, 0, 7, Unit::Unitless).with_hint(DisplayHint::HEX),
            );
            for (bit, leaf) in AEN {
                sink.put(&p(leaf), block.flag(0, 4, *bit));
            }
        }
        0x0c => sink.put(&p("enabled"), block.flag(0, 4, 0)),
        0x10 => {
            for (leaf, shift) in [("tmt2", 0u32), ("tmt1", 16)] {
                sink.put(
                    &p(leaf),
                    block.int_with(0, 4, Unit::Kelvin, |v| match (v >> shift) & 0xffff {
                        0 => Value::Absent,
                        k => Value::Int(k),
                    }),
                );
            }
        }
        _ => {}
    }
    Ok(())
}
