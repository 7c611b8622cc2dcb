// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `manifest.json` schema and block checksums.

use serde::{Deserialize, Serialize};

use super::BlockId;

/// Host description written by the probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Operating system name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    /// Operating system version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    /// Host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Storage driver name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

/// One raw block declared by the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    /// Block identifier.
    pub id: BlockId,
    /// File name relative to the bundle directory.
    pub file: String,
    /// Expected length in bytes.
    pub length: u64,
    /// Optional checksum (`crc32:..`, `blake3:..`, `len:..`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Parsed `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the probe that wrote the bundle.
    pub probe_version: String,
    /// Host description.
    #[serde(default)]
    pub host: HostInfo,
    /// Capture time.
    pub timestamp_iso8601: String,
    /// Index of the drive on the host.
    pub drive_index: u32,
    /// Declared raw blocks.
    pub blocks: Vec<BlockEntry>,
}

/// Probe major version this crate reads.
pub(crate) const SUPPORTED_PROBE_MAJOR: u32 = 1;

impl Manifest {
    /// Whether the probe version is one we can read (`1.x[.y]`).
    pub fn probe_version_supported(&self) -> bool {
        let mut parts = self.probe_version.split('.');
        let major = parts.next().and_then(|m| m.parse::<u32>().ok());
        major == Some(SUPPORTED_PROBE_MAJOR)
            && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    }
}

/// Block checksum declared in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checksum {
    /// CRC-32 (ISO-HDLC polynomial).
    Crc32(u32),
    /// BLAKE3 digest.
    Blake3([u8; 32]),
    /// Length-only check.
    Length(u64),
}

impl Checksum {
    /// Parse `scheme:value`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (scheme, value) = raw
            .split_once(':')
            .ok_or_else(|| format!("checksum `{raw}` lacks a scheme"))?;
        match scheme {
            "crc32" if value.len() == 8 => u32::from_str_radix(value, 16)
                .map(Self::Crc32)
                .map_err(|_| format!("bad crc32 value `{value}`")),
            "blake3" => {
                let mut digest = [0u8; 32];
                hex::decode_to_slice(value, &mut digest)
                    .map_err(|_| format!("bad blake3 value `{value}`"))?;
                Ok(Self::Blake3(digest))
            }
            "len" => value
                .parse::<u64>()
                .map(Self::Length)
                .map_err(|_| format!("bad length value `{value}`")),
            _ => Err(format!("unsupported checksum `{raw}`")),
        }
    }

    /// Compute the checksum of `bytes` in the same scheme.
    pub fn of(&self, bytes: &[u8]) -> Self {
        match self {
            Self::Crc32(_) => Self::Crc32(crc32fast::hash(bytes)),
            Self::Blake3(_) => Self::Blake3(*blake3::hash(bytes).as_bytes()),
            Self::Length(_) => Self::Length(bytes.len() as u64),
        }
    }

    /// Check `bytes` against this checksum.
    pub fn verify(&self, bytes: &[u8]) -> Result<(), String> {
        let actual = self.of(bytes);
        if actual == *self {
            Ok(())
        } else {
            Err(format!("checksum mismatch: expected {self}, computed {actual}"))
        }
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crc32(v) => write!(f, "crc32:{v:08x}"),
            Self::Blake3(d) => write!(f, "blake3:{}", hex::encode(d)),
            Self::Length(n) => write!(f, "len:{n}"),
        }
    }
}
