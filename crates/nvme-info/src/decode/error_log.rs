// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error Information log (page 01h, 64 bytes per entry).

use tracing::warn;

use super::reader::Block;
use super::{require, Sink};
use crate::error::DecodeError;
use crate::units::Unit;
use crate::value::{DisplayHint, Field, Value};

const ENTRY_LEN: usize = 64;

pub(super) fn decode(block: &Block<'_>, sink: &mut Sink<'_>) -> Result<(), DecodeError> {
    require(block, ENTRY_LEN)?;
    if block.len() % ENTRY_LEN != 0 {
        warn!(
            bytes = block.len(),
            "error log length is not a multiple of 64; ignoring trailing bytes"
        );
    }
    let entries = block.len() / ENTRY_LEN;
    let mut populated = 0u128;
    for i in 0..entries {
        let e = block.at(i * ENTRY_LEN, ENTRY_LEN);
        // An all-zero error count marks an unused slot.
        if e.le(0, 8) == Some(0) {
            continue;
        }
        let prefix = format!("error.entry[{populated}]");
        sink.put(&format!("{prefix}.error_count"), e.int(0, 8, Unit::Count));
        sink.put(&format!("{prefix}.submission_queue_id"), e.int(8, 2, Unit::Unitless));
        sink.put(&format!("{prefix}.command_id"), e.hex(10, 2));
        sink.put(&format!("{prefix}.phase"), e.flag(12, 2, 0));
        sink.put(
            &format!("{prefix}.status_code"),
            e.int_with(12, 2, Unit::Unitless, |v| Value::Int(v >> 1))
                .with_hint(DisplayHint::HEX),
        );
        sink.put(&format!("{prefix}.parameter_error_location"), e.hex(14, 2));
        sink.put(&format!("{prefix}.lba"), e.int(16, 8, Unit::Unitless));
        sink.put(&format!("{prefix}.namespace_id"), e.int(24, 4, Unit::Unitless));
        sink.put(&format!("{prefix}.vendor_log_page"), e.hex(28, 1));
        sink.put(&format!("{prefix}.command_specific"), e.hex(32, 8));
        populated += 1;
    }
    sink.put(
        "error.entry_count",
        Field::new(
            Value::Int(populated),
            Unit::Count,
            block.prov(0, entries * ENTRY_LEN),
        ),
    );
    Ok(())
}
