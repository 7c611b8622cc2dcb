// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Primary decoding of raw blocks into an [`InfoTree`].
//!
//! Blocks are visited in [`BlockId`] order, so the output is a pure function
//! of the snapshot bytes. Each group decoder writes through a [`Sink`], which
//! validates paths, stamps the compare policy, and refuses duplicates.

mod controller;
mod error_log;
mod features;
mod firmware;
mod host;
mod namespace;
pub(crate) mod reader;
mod selftest;
mod smart;
mod telemetry;

use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::path::FieldPath;
use crate::policy::PolicyTable;
use crate::snapshot::{BlockId, Snapshot};
use crate::tree::InfoTree;
use crate::value::{Field, Value};

use reader::Block;

/// Collects decoded fields for one tree.
pub(crate) struct Sink<'p> {
    tree: InfoTree,
    policies: &'p PolicyTable,
    faults: Vec<String>,
}

impl<'p> Sink<'p> {
    pub(crate) fn new(policies: &'p PolicyTable) -> Self {
        Self {
            tree: InfoTree::default(),
            policies,
            faults: Vec::new(),
        }
    }

    /// Add a field. Invalid or duplicate paths are recorded as faults.
    pub(crate) fn put(&mut self, path: &str, field: Field) {
        let path = match FieldPath::parse(path) {
            Ok(p) => p,
            Err(e) => {
                self.faults.push(e.to_string());
                return;
            }
        };
        if *field.value() == Value::Unknown {
            warn!(
                path = %path,
                reason = field.provenance().error().unwrap_or("unspecified"),
                "field decoded as unknown"
            );
        }
        let policy = self.policies.classify(&path);
        if self.tree.contains(&path) {
            self.faults.push(format!("duplicate path `{path}`"));
        } else {
            self.tree.insert_new(path, field.with_policy(policy));
        }
    }

    /// Add `<prefix>._raw` plus one boolean per named bit.
    pub(crate) fn bitfield(
        &mut self,
        prefix: &str,
        block: &Block<'_>,
        offset: usize,
        len: usize,
        bits: &[(u32, &str)],
    ) {
        self.put(&format!("{prefix}._raw"), block.hex(offset, len));
        for (bit, name) in bits {
            self.put(&format!("{prefix}.{name}"), block.flag(offset, len, *bit));
        }
    }

    fn finish(self) -> Result<InfoTree, DecodeError> {
        if self.faults.is_empty() {
            Ok(self.tree)
        } else {
            Err(DecodeError::Internal {
                detail: self.faults.join("; "),
            })
        }
    }
}

/// Fail with `UndecodableBlock` when `block` is shorter than `min` bytes.
pub(crate) fn require(block: &Block<'_>, min: usize) -> Result<(), DecodeError> {
    if block.len() < min {
        return Err(DecodeError::UndecodableBlock {
            block: block.id().clone(),
            reason: format!("{} bytes is shorter than the minimum {min}", block.len()),
        });
    }
    Ok(())
}

/// Decode every block of `snapshot` without running derivations.
pub fn decode_primary(
    snapshot: &Snapshot,
    policies: &PolicyTable,
) -> Result<InfoTree, DecodeError> {
    let mut sink = Sink::new(policies);
    host::decode(snapshot, &mut sink);
    for (id, bytes) in snapshot.blocks() {
        let block = Block::new(id, bytes);
        let before = sink.tree.len();
        match id {
            BlockId::IdentifyController => controller::decode(&block, &mut sink)?,
            BlockId::IdentifyNamespace(nsid) => namespace::decode(*nsid, &block, &mut sink)?,
            BlockId::Smart => smart::decode(&block, &mut sink)?,
            BlockId::ErrorLog => error_log::decode(&block, &mut sink)?,
            BlockId::FirmwareSlot => firmware::decode(&block, &mut sink)?,
            BlockId::Feature(fid) => features::decode(*fid, &block, &mut sink)?,
            BlockId::SelftestLog => selftest::decode(&block, &mut sink)?,
            BlockId::TelemetryHeader => telemetry::decode(&block, &mut sink)?,
            BlockId::Vendor(name) => {
                // Vendor-unique pages are opaque.
                require(&block, 1)?;
                sink.put(&format!("vendor.{name}.bytes"), block.raw(0, block.len(), false));
            }
        }
        debug!(block = %id, fields = sink.tree.len() - before, "decoded block");
    }
    sink.finish()
}
