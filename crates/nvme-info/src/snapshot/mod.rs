// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Raw snapshot bundles: block identifiers, manifest, loader.
//!
//! A [`Snapshot`] is an immutable set of raw NVMe blocks plus host metadata.
//! The loader checks lengths and checksums only; semantic decoding lives in
//! [`crate::decode`].

mod load;
mod manifest;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

pub use load::{load, load_pair};
pub use manifest::{BlockEntry, Checksum, HostInfo, Manifest};

/// Offset of the serial number in Identify Controller.
const SN: std::ops::Range<usize> = 4..24;
/// Offset of the model number in Identify Controller.
const MN: std::ops::Range<usize> = 24..64;
/// Offset of the firmware-update byte (FRMW) in Identify Controller.
const FRMW: usize = 260;

/// Identifier of a raw block in a bundle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockId {
    /// Identify Controller (CNS 01h).
    IdentifyController,
    /// Identify Namespace (CNS 00h) for the given NSID.
    IdentifyNamespace(u32),
    /// SMART / Health Information log (02h).
    Smart,
    /// Error Information log (01h).
    ErrorLog,
    /// Firmware Slot Information log (03h).
    FirmwareSlot,
    /// Get Features completion dword for a feature identifier.
    Feature(u8),
    /// Device Self-test log (06h).
    SelftestLog,
    /// Telemetry host-initiated log header (07h).
    TelemetryHeader,
    /// Vendor-unique page.
    Vendor(String),
}

impl BlockId {
    /// Parse a manifest block id.
    pub fn parse(id: &str) -> Result<Self, String> {
        match id {
            "identify_controller" => return Ok(Self::IdentifyController),
            "smart" => return Ok(Self::Smart),
            "error_log" => return Ok(Self::ErrorLog),
            "firmware_slot" => return Ok(Self::FirmwareSlot),
            "selftest_log" => return Ok(Self::SelftestLog),
            "telemetry_header" => return Ok(Self::TelemetryHeader),
            _ => {}
        }
        let (kind, arg) = id
            .split_once('.')
            .ok_or_else(|| format!("unknown block id `{id}`"))?;
        match kind {
            "identify_namespace" => match arg.parse::<u32>() {
                Ok(nsid) if nsid != 0 && nsid != u32::MAX => Ok(Self::IdentifyNamespace(nsid)),
                _ => Err(format!("invalid namespace id in `{id}`")),
            },
            "feature" => {
                let fid = match arg.strip_prefix("0x") {
                    Some(hex) => u8::from_str_radix(hex, 16),
                    None => arg.parse::<u8>(),
                };
                fid.map(Self::Feature)
                    .map_err(|_| format!("invalid feature id in `{id}`"))
            }
            "vendor"
                if !arg.is_empty()
                    && arg
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') =>
            {
                Ok(Self::Vendor(arg.to_owned()))
            }
            _ => Err(format!("unknown block id `{id}`")),
        }
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentifyController => f.write_str("identify_controller"),
            Self::IdentifyNamespace(nsid) => write!(f, "identify_namespace.{nsid}"),
            Self::Smart => f.write_str("smart"),
            Self::ErrorLog => f.write_str("error_log"),
            Self::FirmwareSlot => f.write_str("firmware_slot"),
            Self::Feature(fid) => write!(f, "feature.0x{fid:02x}"),
            Self::SelftestLog => f.write_str("selftest_log"),
            Self::TelemetryHeader => f.write_str("telemetry_header"),
            Self::Vendor(name) => write!(f, "vendor.{name}"),
        }
    }
}

impl std::str::FromStr for BlockId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BlockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for BlockId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// What makes two snapshots describe "the same drive".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveIdentity {
    /// Controller serial number.
    pub serial: String,
    /// Controller model number.
    pub model: String,
    /// Number of firmware slots.
    pub firmware_slots: u8,
    /// Whether slot 1 is read-only.
    pub slot1_read_only: bool,
}

impl std::fmt::Display for DriveIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} s/n {} ({} firmware slots{})",
            self.model,
            self.serial,
            self.firmware_slots,
            if self.slot1_read_only { ", slot 1 read-only" } else { "" }
        )
    }
}

/// Textual side files of a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Addenda {
    /// Contents of `host.txt`.
    pub host_txt: Option<String>,
    /// Contents of `probe.log`.
    pub probe_log: Option<String>,
}

/// One loaded bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    source: Option<PathBuf>,
    manifest: Manifest,
    blocks: BTreeMap<BlockId, Vec<u8>>,
    addenda: Addenda,
}

impl Snapshot {
    /// Assemble a snapshot from already-validated parts.
    pub fn from_parts(
        manifest: Manifest,
        blocks: BTreeMap<BlockId, Vec<u8>>,
        addenda: Addenda,
    ) -> Self {
        Self {
            source: None,
            manifest,
            blocks,
            addenda,
        }
    }

    pub(crate) fn with_source(mut self, dir: &Path) -> Self {
        self.source = Some(dir.to_path_buf());
        self
    }

    /// Directory the bundle was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The parsed manifest.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Raw bytes of a block.
    pub fn block(&self, id: &BlockId) -> Option<&[u8]> {
        self.blocks.get(id).map(Vec::as_slice)
    }

    /// All blocks in id order.
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockId, &[u8])> {
        self.blocks.iter().map(|(id, b)| (id, b.as_slice()))
    }

    /// Textual addenda.
    pub fn addenda(&self) -> &Addenda {
        &self.addenda
    }

    /// Contents of `probe.log`, if the bundle carried one.
    pub fn probe_log(&self) -> Option<&str> {
        self.addenda.probe_log.as_deref()
    }

    /// Read the drive identity from Identify Controller.
    ///
    /// Returns `None` when the block is missing or too short.
    pub fn identity(&self) -> Option<DriveIdentity> {
        let id = self.block(&BlockId::IdentifyController)?;
        let text = |r: std::ops::Range<usize>| {
            id.get(r).map(|b| {
                String::from_utf8_lossy(b)
                    .trim_matches(|c| c == ' ' || c == '\0')
                    .to_owned()
            })
        };
        let frmw = *id.get(FRMW)?;
        Some(DriveIdentity {
            serial: text(SN)?,
            model: text(MN)?,
            firmware_slots: (frmw >> 1) & 0x07,
            slot1_read_only: frmw & 0x01 != 0,
        })
    }
}
