// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Telemetry Host-Initiated log header (page 07h, first 512 bytes).

use super::reader::Block;
use super::{require, Sink};
use crate::error::DecodeError;
use crate::units::Unit;

pub(super) fn decode(block: &Block<'_>, sink: &mut Sink<'_>) -> Result<(), DecodeError> {
    require(block, 8)?;
    sink.put("telemetry.log_id", block.hex(0, 1));
    sink.put("telemetry.ieee_oui", block.hex(5, 3));
    for (area, offset) in [(1, 8), (2, 10), (3, 12)] {
        sink.put(
            &format!("telemetry.data_area_{area}_last_block"),
            block.int(offset, 2, Unit::Count),
        );
    }
    sink.put("telemetry.controller_data_available", block.flag(382, 1, 0));
    sink.put(
        "telemetry.controller_data_generation",
        block.int(383, 1, Unit::Count),
    );
    sink.put("telemetry.reason_id", block.raw(384, 128, true));
    Ok(())
}
