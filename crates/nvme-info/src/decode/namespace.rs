// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identify Namespace (CNS 00h, 4096 bytes per NSID).

use tracing::debug;

use super::reader::Block;
use super::{require, Sink};
use crate::error::DecodeError;
use crate::units::Unit;
use crate::value::{DisplayHint, Field, Value};

const NSFEAT: &[(u32, &str)] = &[
    (0, "thin_provisioning"),
    (1, "namespace_atomics"),
    (2, "deallocated_error"),
    (3, "guid_never_reused"),
    (4, "optimal_io"),
];

const DPC: &[(u32, &str)] = &[
    (0, "type1"),
    (1, "type2"),
    (2, "type3"),
    (3, "first_eight"),
    (4, "last_eight"),
];

const PROTECTION: &[(u128, &str)] = &[(0, "none"), (1, "type1"), (2, "type2"), (3, "type3")];

const PERFORMANCE: &[(u128, &str)] = &[(0, "best"), (1, "better"), (2, "good"), (3, "degraded")];

const LBAF: usize = 128;
const LBAF_LEN: usize = 4;

pub(super) fn decode(nsid: u32, block: &Block<'_>, sink: &mut Sink<'_>) -> Result<(), DecodeError> {
    require(block, 8)?;
    if block.le(0, 8) == Some(0) {
        debug!(nsid, "skipping inactive namespace");
        return Ok(());
    }
    let prefix = format!("namespace.{nsid}");
    let nlbaf = block.byte(25).map_or(0, usize::from).min(63);
    let flbas = block.byte(26).map(|f| usize::from(f & 0x0f));
    // Data size of the format in use; needed to turn block counts into bytes.
    let block_size = flbas
        .and_then(|i| block.byte(LBAF + i * LBAF_LEN + 2))
        .filter(|lbads| (9..64).contains(lbads))
        .map(|lbads| 1u128 << lbads);

    for (name, offset) in [("size", 0), ("capacity", 8), ("utilization", 16)] {
        sink.put(&format!("{prefix}.{name}_lba"), block.int(offset, 8, Unit::Blocks));
        let bytes = match (block.le(offset, 8), block_size) {
            (Some(lba), Some(bs)) => Field::new(
                Value::Int(lba.saturating_mul(bs)),
                Unit::Bytes,
                block.prov(offset, 8),
            ),
            (Some(_), None) => Field::unknown(
                Unit::Bytes,
                block.prov(offset, 8),
                "no valid lba format in use",
            ),
            (None, _) => block.int(offset, 8, Unit::Bytes),
        };
        sink.put(
            &format!("{prefix}.{name}_bytes"),
            bytes.with_hint(DisplayHint::GROUPED),
        );
    }
    sink.bitfield(&format!("{prefix}.features"), block, 24, 1, NSFEAT);
    sink.put(
        &format!("{prefix}.lba_format_count"),
        block.int_with(25, 1, Unit::Count, |v| Value::Int(v + 1)),
    );
    sink.put(&format!("{prefix}.current_lba_format"), block.bits(26, 1, 0, 3, Unit::Unitless));
    sink.put(&format!("{prefix}.metadata_extended"), block.flag(26, 1, 4));
    sink.bitfield(&format!("{prefix}.protection.capabilities"), block, 28, 1, DPC);
    sink.put(
        &format!("{prefix}.protection.type"),
        block.symbol(29, 1, 0, 2, PROTECTION),
    );
    sink.put(&format!("{prefix}.protection.pi_first"), block.flag(29, 1, 3));
    sink.put(&format!("{prefix}.nguid"), block.raw(104, 16, true));
    sink.put(&format!("{prefix}.eui64"), block.raw(120, 8, true));
    for i in 0..=nlbaf.min(15) {
        let f = block.at(LBAF + i * LBAF_LEN, LBAF_LEN);
        let lp = format!("{prefix}.lba_format[{i}]");
        sink.put(&format!("{lp}.metadata_size"), f.int(0, 2, Unit::Bytes));
        sink.put(
            &format!("{lp}.data_size"),
            f.int_with(2, 1, Unit::Bytes, |lbads| {
                if (9..64).contains(&lbads) {
                    Value::Int(1u128 << lbads)
                } else {
                    Value::Absent
                }
            }),
        );
        sink.put(
            &format!("{lp}.relative_performance"),
            f.symbol(3, 1, 0, 1, PERFORMANCE),
        );
        sink.put(
            &format!("{lp}.in_use"),
            Field::new(Value::Bool(flbas == Some(i)), Unit::Unitless, block.prov(26, 1)),
        );
    }
    Ok(())
}
