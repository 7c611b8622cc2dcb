// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Snapshot bundle fixtures (in-memory and on-disk).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nvme_info::snapshot::{Addenda, BlockEntry, HostInfo, Manifest};
use nvme_info::{BlockId, Snapshot};

use crate::blocks::{
    error_log, feature_dword, firmware_slots, selftest_log, telemetry_header,
    IdentifyControllerBuilder, NamespaceBuilder, SmartLogBuilder,
};

/// Checksum scheme written into the manifest for each block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumScheme {
    /// No checksum entry.
    None,
    /// `crc32:<hex>`.
    #[default]
    Crc32,
    /// `blake3:<hex>`.
    Blake3,
    /// `len:<n>`.
    Length,
}

impl ChecksumScheme {
    fn entry(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::None => None,
            Self::Crc32 => Some(format!("crc32:{:08x}", crc32fast::hash(bytes))),
            Self::Blake3 => Some(format!("blake3:{}", blake3::hash(bytes).to_hex())),
            Self::Length => Some(format!("len:{}", bytes.len())),
        }
    }
}

/// Builder for a snapshot bundle.
///
/// # Example
///
/// ```
/// use nvme_dry_tests::{BundleBuilder, SmartLogBuilder};
///
/// let snapshot = BundleBuilder::healthy()
///     .smart(SmartLogBuilder::new().percentage_used(40).build())
///     .snapshot();
/// assert!(snapshot.identity().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    probe_version: String,
    host: HostInfo,
    timestamp: String,
    drive_index: u32,
    blocks: BTreeMap<BlockId, Vec<u8>>,
    checksum: ChecksumScheme,
    host_txt: Option<String>,
    probe_log: Option<String>,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self {
            probe_version: "1.4.2".to_owned(),
            host: HostInfo {
                os_name: Some("Linux".to_owned()),
                os_version: Some("6.8.0".to_owned()),
                hostname: Some("rig-7".to_owned()),
                driver: Some("nvme".to_owned()),
            },
            timestamp: "2026-03-01T10:15:00Z".to_owned(),
            drive_index: 0,
            blocks: BTreeMap::new(),
            checksum: ChecksumScheme::default(),
            host_txt: None,
            probe_log: None,
        }
    }
}

impl BundleBuilder {
    /// Empty bundle with a supported probe version and no blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle describing a healthy drive with every standard block.
    pub fn healthy() -> Self {
        Self::new()
            .controller(IdentifyControllerBuilder::new().build())
            .block(BlockId::IdentifyNamespace(1), NamespaceBuilder::new().build())
            .smart(SmartLogBuilder::new().build())
            .block(BlockId::ErrorLog, error_log(&[], 4))
            .block(
                BlockId::FirmwareSlot,
                firmware_slots(1, 0, &["1B2QEXM7", "1B2QEXM7"]),
            )
            .block(BlockId::Feature(0x04), feature_dword(358))
            .block(BlockId::Feature(0x06), feature_dword(1))
            .block(BlockId::SelftestLog, selftest_log(0, 0, &[(0, 2, 3_900)]))
            .block(BlockId::TelemetryHeader, telemetry_header([0, 0, 0], 0))
            .host_txt("driver: nvme 1.0\nos_path: /dev/nvme0n1\n")
            .probe_log("probe 1.4.2: captured 9 blocks\n")
    }

    /// Set the probe version.
    pub fn probe_version(mut self, version: &str) -> Self {
        self.probe_version = version.to_owned();
        self
    }

    /// Set the capture timestamp.
    pub fn timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = timestamp.to_owned();
        self
    }

    /// Set the checksum scheme used when writing.
    pub fn checksum(mut self, scheme: ChecksumScheme) -> Self {
        self.checksum = scheme;
        self
    }

    /// Add or replace a raw block.
    pub fn block(mut self, id: BlockId, bytes: Vec<u8>) -> Self {
        self.blocks.insert(id, bytes);
        self
    }

    /// Drop a block.
    pub fn without(mut self, id: &BlockId) -> Self {
        self.blocks.remove(id);
        self
    }

    /// Replace the Identify Controller block.
    pub fn controller(self, bytes: Vec<u8>) -> Self {
        self.block(BlockId::IdentifyController, bytes)
    }

    /// Replace the SMART block.
    pub fn smart(self, bytes: Vec<u8>) -> Self {
        self.block(BlockId::Smart, bytes)
    }

    /// Set the `host.txt` addendum.
    pub fn host_txt(mut self, text: &str) -> Self {
        self.host_txt = Some(text.to_owned());
        self
    }

    /// Set the `probe.log` addendum.
    pub fn probe_log(mut self, text: &str) -> Self {
        self.probe_log = Some(text.to_owned());
        self
    }

    /// File name a block is written under.
    pub fn file_name(id: &BlockId) -> String {
        format!("{id}.bin")
    }

    fn manifest(&self) -> Manifest {
        Manifest {
            probe_version: self.probe_version.clone(),
            host: self.host.clone(),
            timestamp_iso8601: self.timestamp.clone(),
            drive_index: self.drive_index,
            blocks: self
                .blocks
                .iter()
                .map(|(id, bytes)| BlockEntry {
                    id: id.clone(),
                    file: Self::file_name(id),
                    length: bytes.len() as u64,
                    checksum: self.checksum.entry(bytes),
                })
                .collect(),
        }
    }

    /// In-memory snapshot without touching the filesystem.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_parts(
            self.manifest(),
            self.blocks.clone(),
            Addenda {
                host_txt: self.host_txt.clone(),
                probe_log: self.probe_log.clone(),
            },
        )
    }

    /// Write the bundle into `dir` (created if needed) and return its path.
    pub fn write(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let manifest = serde_json::to_vec_pretty(&self.manifest())?;
        fs::write(dir.join("manifest.json"), manifest)?;
        for (id, bytes) in &self.blocks {
            fs::write(dir.join(Self::file_name(id)), bytes)?;
        }
        if let Some(text) = &self.host_txt {
            fs::write(dir.join("host.txt"), text)?;
        }
        if let Some(text) = &self.probe_log {
            fs::write(dir.join("probe.log"), text)?;
        }
        Ok(dir.to_path_buf())
    }
}
