// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! SMART / Health Information log (page 02h, 512 bytes).

use super::reader::Block;
use super::{require, Sink};
use crate::error::DecodeError;
use crate::units::Unit;
use crate::value::DisplayHint;

/// Critical warning bits, in the order the decoder reports them.
pub(crate) const CRITICAL_WARNING_BITS: &[(u32, &str)] = &[
    (0, "temperature"),
    (1, "spare_below_threshold"),
    (2, "reliability_degraded"),
    (3, "media_readonly"),
    (4, "backup_failed"),
    (5, "pmr_unreliable"),
];

/// 128-bit counters: (offset, name, unit).
const COUNTERS: &[(usize, &str, Unit)] = &[
    (32, "data_units_read", Unit::DataUnits),
    (48, "data_units_written", Unit::DataUnits),
    (64, "host_read_commands", Unit::Count),
    (80, "host_write_commands", Unit::Count),
    (96, "controller_busy_time", Unit::Minutes),
    (112, "power_cycles", Unit::Count),
    (128, "power_on_hours", Unit::Hours),
    (144, "unsafe_shutdowns", Unit::Count),
    (160, "media_errors", Unit::Count),
    (176, "error_log_entries", Unit::Count),
];

const SENSORS: usize = 200;

pub(super) fn decode(block: &Block<'_>, sink: &mut Sink<'_>) -> Result<(), DecodeError> {
    require(block, 1)?;
    sink.bitfield("smart.critical_warning", block, 0, 1, CRITICAL_WARNING_BITS);
    sink.put("smart.composite_temp", block.kelvin(1));
    sink.put("smart.available_spare", block.int(3, 1, Unit::Percent));
    sink.put("smart.available_spare_threshold", block.int(4, 1, Unit::Percent));
    sink.put("smart.percentage_used", block.int(5, 1, Unit::Percent));
    sink.put("smart.endurance_group_warning", block.hex(6, 1));
    for (offset, name, unit) in COUNTERS {
        sink.put(
            &format!("smart.{name}"),
            block.int(*offset, 16, *unit).with_hint(DisplayHint::GROUPED),
        );
    }
    sink.put(
        "smart.warning_composite_temp_time",
        block.int(192, 4, Unit::Minutes),
    );
    sink.put(
        "smart.critical_composite_temp_time",
        block.int(196, 4, Unit::Minutes),
    );
    for i in 0..8 {
        sink.put(
            &format!("smart.temp_sensor_{}", i + 1),
            block.kelvin(SENSORS + i * 2),
        );
    }
    sink.put("smart.thermal_mgmt_temp1_transitions", block.int(216, 4, Unit::Count));
    sink.put("smart.thermal_mgmt_temp2_transitions", block.int(220, 4, Unit::Count));
    sink.put("smart.thermal_mgmt_temp1_time", block.int(224, 4, Unit::Seconds));
    sink.put("smart.thermal_mgmt_temp2_time", block.int(228, 4, Unit::Seconds));
    Ok(())
}
