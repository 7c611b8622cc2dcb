// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Firmware Slot Information log (page 03h, 512 bytes).

use super::reader::Block;
use super::{require, Sink};
use crate::error::DecodeError;
use crate::units::Unit;
use crate::value::Value;

const SLOTS: usize = 7;
const FRS: usize = 8;

fn slot(v: u128) -> Value {
    if v == 0 {
        Value::Absent
    } else {
        Value::Int(v)
    }
}

pub(super) fn decode(block: &Block<'_>, sink: &mut Sink<'_>) -> Result<(), DecodeError> {
    require(block, 1)?;
    sink.put(
        "firmware.active_slot",
        block.int_with(0, 1, Unit::Unitless, |afi| slot(afi & 0x07)),
    );
    sink.put(
        "firmware.next_boot_slot",
        block.int_with(0, 1, Unit::Unitless, |afi| slot((afi >> 4) & 0x07)),
    );
    for n in 1..=SLOTS {
        let revision = block.ascii(FRS * n, 8);
        // Empty slots are not reported.
        if matches!(revision.value(), Value::Absent) {
            continue;
        }
        sink.put(&format!("firmware.slot[{n}].revision"), revision);
    }
    Ok(())
}
