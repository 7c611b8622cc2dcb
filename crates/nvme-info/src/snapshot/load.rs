// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reading bundles from disk.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path};

use tracing::{debug, warn};

use super::{Addenda, BlockId, Checksum, Manifest, Snapshot};
use crate::error::LoadError;

const MANIFEST_FILE: &str = "manifest.json";
const HOST_FILE: &str = "host.txt";
const PROBE_LOG_FILE: &str = "probe.log";

fn io_failure(path: &Path, source: std::io::Error) -> LoadError {
    LoadError::IoFailure {
        path: path.to_path_buf(),
        source,
    }
}

fn read_manifest(dir: &Path) -> Result<Manifest, LoadError> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LoadError::MissingManifest {
                dir: dir.to_path_buf(),
            })
        }
        Err(e) => return Err(io_failure(&path, e)),
    };
    let corrupt = |reason: String| LoadError::CorruptManifest {
        path: path.clone(),
        reason,
    };
    let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
    if !manifest.probe_version_supported() {
        return Err(LoadError::UnsupportedProbeVersion {
            version: manifest.probe_version,
        });
    }
    let mut seen = BTreeSet::new();
    for entry in &manifest.blocks {
        if !seen.insert(&entry.id) {
            return Err(corrupt(format!("duplicate block id `{}`", entry.id)));
        }
        let relative = Path::new(&entry.file);
        let plain = !entry.file.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(corrupt(format!(
                "block `{}` file `{}` must be a relative path inside the bundle",
                entry.id, entry.file
            )));
        }
        if let Some(sum) = &entry.checksum {
            Checksum::parse(sum).map_err(corrupt)?;
        }
    }
    Ok(manifest)
}

fn read_addendum(dir: &Path, name: &str) -> Option<String> {
    match fs::read(dir.join(name)) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                warn!(file = name, error = %e, "skipping unreadable addendum");
            }
            None
        }
    }
}

/// Load a snapshot bundle from `dir`.
///
/// The manifest is read first; every declared block must exist, match its
/// declared length, and match its checksum when one is given. `host.txt` and
/// `probe.log` are optional.
pub fn load(dir: impl AsRef<Path>) -> Result<Snapshot, LoadError> {
    let dir = dir.as_ref();
    let manifest = read_manifest(dir)?;
    let mut blocks = BTreeMap::new();
    for entry in &manifest.blocks {
        let path = dir.join(&entry.file);
        let bytes = fs::read(&path).map_err(|e| io_failure(&path, e))?;
        if bytes.len() as u64 != entry.length {
            return Err(LoadError::CorruptBlock {
                block: entry.id.clone(),
                reason: format!(
                    "expected {} bytes, found {}",
                    entry.length,
                    bytes.len()
                ),
            });
        }
        if let Some(sum) = &entry.checksum {
            // Already validated in read_manifest.
            if let Ok(sum) = Checksum::parse(sum) {
                sum.verify(&bytes).map_err(|reason| LoadError::CorruptBlock {
                    block: entry.id.clone(),
                    reason,
                })?;
            }
        }
        debug!(block = %entry.id, bytes = bytes.len(), "loaded block");
        blocks.insert(entry.id.clone(), bytes);
    }
    let addenda = Addenda {
        host_txt: read_addendum(dir, HOST_FILE),
        probe_log: read_addendum(dir, PROBE_LOG_FILE),
    };
    Ok(Snapshot::from_parts(manifest, blocks, addenda).with_source(dir))
}

/// Load two bundles that must describe the same drive.
///
/// Identity is serial, model, and firmware-slot layout from Identify
/// Controller. A bundle without a usable Identify Controller block cannot be
/// paired.
pub fn load_pair(
    before: impl AsRef<Path>,
    after: impl AsRef<Path>,
) -> Result<(Snapshot, Snapshot), LoadError> {
    let before = load(before)?;
    let after = load(after)?;
    let identity = |s: &Snapshot| {
        s.identity().ok_or_else(|| LoadError::CorruptBlock {
            block: BlockId::IdentifyController,
            reason: "drive identity unavailable".to_owned(),
        })
    };
    let (a, b) = (identity(&before)?, identity(&after)?);
    if a != b {
        return Err(LoadError::DriveIdentityMismatch {
            before: Box::new(a),
            after: Box::new(b),
        });
    }
    Ok((before, after))
}
