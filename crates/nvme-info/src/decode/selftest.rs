// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Device Self-test log (page 06h, 564 bytes).

use super::reader::{extract, Block};
use super::{require, Sink};
use crate::error::DecodeError;
use crate::units::Unit;
use crate::value::{Field, Value};

const OPERATION: &[(u128, &str)] = &[(0, "none"), (1, "short"), (2, "extended"), (0xe, "vendor")];

const RESULT: &[(u128, &str)] = &[
    (0, "completed"),
    (1, "aborted_by_command"),
    (2, "aborted_by_reset"),
    (3, "aborted_by_namespace_removal"),
    (4, "aborted_by_format"),
    (5, "fatal_error"),
    (6, "failed_unknown_segment"),
    (7, "failed_segments"),
    (8, "aborted_unknown"),
    (9, "aborted_by_sanitize"),
];

/// Result codes that mean the test itself failed.
const FAILURES: [u128; 3] = [5, 6, 7];
const UNUSED: u128 = 0xf;

const RESULTS: usize = 4;
const RESULT_LEN: usize = 28;
const MAX_RESULTS: usize = 20;

pub(super) fn decode(block: &Block<'_>, sink: &mut Sink<'_>) -> Result<(), DecodeError> {
    require(block, 2)?;
    let running = block.byte(0).map(|b| b & 0x0f) != Some(0);
    sink.put("selftest.current_operation", block.symbol(0, 1, 0, 3, OPERATION));
    sink.put(
        "selftest.current_completion",
        block.int_with(1, 1, Unit::Percent, |v| {
            if running {
                Value::Int(v & 0x7f)
            } else {
                Value::Absent
            }
        }),
    );
    let mut failures = 0u128;
    let mut count = 0u128;
    for i in 0..MAX_RESULTS {
        let r = block.at(RESULTS + i * RESULT_LEN, RESULT_LEN);
        let Some(status) = r.byte(0).map(u128::from) else {
            break;
        };
        if extract(status, 0, 3) == UNUSED {
            continue;
        }
        if FAILURES.contains(&extract(status, 0, 3)) {
            failures += 1;
        }
        let prefix = format!("selftest.result[{count}]");
        sink.put(&format!("{prefix}.result"), r.symbol(0, 1, 0, 3, RESULT));
        sink.put(&format!("{prefix}.test"), r.symbol(0, 1, 4, 7, OPERATION));
        sink.put(&format!("{prefix}.segment"), r.int(1, 1, Unit::Unitless));
        sink.put(&format!("{prefix}.power_on_hours"), r.int(4, 8, Unit::Hours));
        count += 1;
    }
    let span = (RESULTS + MAX_RESULTS * RESULT_LEN).min(block.len());
    sink.put(
        "selftest.result_count",
        Field::new(Value::Int(count), Unit::Count, block.prov(0, span)),
    );
    sink.put(
        "selftest.failures",
        Field::new(Value::Int(failures), Unit::Count, block.prov(0, span)),
    );
    Ok(())
}
