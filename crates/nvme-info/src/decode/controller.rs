// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identify Controller (CNS 01h, 4096 bytes).

use super::reader::Block;
use super::{require, Sink};
use crate::error::DecodeError;
use crate::units::Unit;
use crate::value::{DisplayHint, Field, Value};

const CMIC: &[(u32, &str)] = &[
    (0, "multi_port"),
    (1, "multi_controller"),
    (2, "sriov"),
    (3, "ana_reporting"),
];

const OAES: &[(u32, &str)] = &[
    (8, "namespace_attribute"),
    (9, "firmware_activation"),
    (11, "ana_change"),
    (12, "predictable_latency"),
    (13, "lba_status"),
    (14, "endurance_group"),
];

const OACS: &[(u32, &str)] = &[
    (0, "security"),
    (1, "format_nvm"),
    (2, "firmware"),
    (3, "ns_management"),
    (4, "self_test"),
    (5, "directives"),
    (6, "nvme_mi"),
    (7, "virtualization"),
    (8, "doorbell_buffer"),
    (9, "get_lba_status"),
];

const FRMW: &[(u32, &str)] = &[(0, "slot1_read_only"), (4, "activation_without_reset")];

const LPA: &[(u32, &str)] = &[
    (0, "smart_per_namespace"),
    (1, "commands_effects"),
    (2, "extended_data"),
    (3, "telemetry"),
];

const ONCS: &[(u32, &str)] = &[
    (0, "compare"),
    (1, "write_uncorrectable"),
    (2, "dataset_management"),
    (3, "write_zeroes"),
    (4, "save_select"),
    (5, "reservations"),
    (6, "timestamp"),
    (7, "verify"),
];

const CNTRLTYPE: &[(u128, &str)] = &[(1, "io"), (2, "discovery"), (3, "admin")];

const POWER_STATES: usize = 2048;
const POWER_STATE_LEN: usize = 32;

fn version(block: &Block<'_>) -> Field {
    block.int_with(80, 4, Unit::Unitless, |v| {
        if v == 0 {
            return Value::Absent;
        }
        let (major, minor, tertiary) = (v >> 16, (v >> 8) & 0xff, v & 0xff);
        Value::Text(format!("{major}.{minor}.{tertiary}"))
    })
}

fn power_states(block: &Block<'_>, sink: &mut Sink<'_>) {
    let Some(npss) = block.byte(263) else {
        return;
    };
    for i in 0..=usize::from(npss).min(31) {
        let ps = block.at(POWER_STATES + i * POWER_STATE_LEN, POWER_STATE_LEN);
        let prefix = format!("controller.power_state[{i}]");
        let scale = match ps.byte(3) {
            Some(flags) if flags & 0x01 != 0 => 0.0001,
            _ => 0.01,
        };
        sink.put(
            &format!("{prefix}.max_power"),
            ps.int_with(0, 2, Unit::Watts, |mp| Value::Real(mp as f64 * scale))
                .with_hint(DisplayHint::decimals(2)),
        );
        sink.put(&format!("{prefix}.non_operational"), ps.flag(3, 1, 1));
        sink.put(&format!("{prefix}.entry_latency"), ps.int(4, 4, Unit::Micros));
        sink.put(&format!("{prefix}.exit_latency"), ps.int(8, 4, Unit::Micros));
    }
}

pub(super) fn decode(block: &Block<'_>, sink: &mut Sink<'_>) -> Result<(), DecodeError> {
    require(block, 4)?;
    sink.put("controller.vendor_id", block.hex(0, 2));
    sink.put("controller.subsystem_vendor_id", block.hex(2, 2));
    sink.put("controller.serial_number", block.ascii(4, 20));
    sink.put("controller.model_number", block.ascii(24, 40));
    sink.put("controller.firmware_revision", block.ascii(64, 8));
    sink.put(
        "controller.recommended_arbitration_burst",
        block.int(72, 1, Unit::Count),
    );
    sink.put("controller.ieee_oui", block.hex(73, 3));
    sink.bitfield("controller.cmic", block, 76, 1, CMIC);
    // MDTS is a power of two in units of the minimum page size; 0 means unlimited.
    sink.put(
        "controller.max_data_transfer",
        block.int_with(77, 1, Unit::Unitless, |v| {
            if v == 0 {
                Value::Absent
            } else {
                Value::Int(v)
            }
        }),
    );
    sink.put("controller.controller_id", block.hex(78, 2));
    sink.put("controller.version", version(block));
    sink.bitfield("controller.oaes", block, 92, 4, OAES);
    sink.put(
        "controller.controller_type",
        block.int_with(111, 1, Unit::Unitless, |v| {
            if v == 0 {
                Value::Absent
            } else {
                let name = CNTRLTYPE
                    .iter()
                    .find(|(c, _)| *c == v)
                    .map_or("reserved", |(_, n)| *n);
                Value::Enum(name.to_owned())
            }
        }),
    );
    sink.put("controller.fru_guid", block.raw(112, 16, true));
    sink.bitfield("controller.oacs", block, 256, 2, OACS);
    sink.put(
        "controller.abort_command_limit",
        block.int_with(258, 1, Unit::Count, |v| Value::Int(v + 1)),
    );
    sink.put(
        "controller.async_event_request_limit",
        block.int_with(259, 1, Unit::Count, |v| Value::Int(v + 1)),
    );
    sink.bitfield("controller.frmw", block, 260, 1, FRMW);
    sink.put(
        "controller.frmw.slot_count",
        block.bits(260, 1, 1, 3, Unit::Count),
    );
    sink.bitfield("controller.lpa", block, 261, 1, LPA);
    sink.put(
        "controller.error_log_page_entries",
        block.int_with(262, 1, Unit::Count, |v| Value::Int(v + 1)),
    );
    sink.put(
        "controller.power_state_count",
        block.int_with(263, 1, Unit::Count, |v| Value::Int(v + 1)),
    );
    sink.put("controller.wctemp", block.kelvin(266));
    sink.put("controller.cctemp", block.kelvin(268));
    sink.put(
        "controller.total_capacity",
        block.int(280, 16, Unit::Bytes).with_hint(DisplayHint::GROUPED),
    );
    sink.put(
        "controller.unallocated_capacity",
        block.int(296, 16, Unit::Bytes).with_hint(DisplayHint::GROUPED),
    );
    sink.put("controller.namespace_count", block.int(516, 4, Unit::Count));
    sink.bitfield("controller.oncs", block, 520, 2, ONCS);
    sink.put("controller.volatile_write_cache", block.flag(525, 1, 0));
    sink.put("controller.subnqn", block.ascii(768, 256));
    power_states(block, sink);
    Ok(())
}
