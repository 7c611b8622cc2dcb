// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Loader and decoder errors, plus the coarse error taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use crate::snapshot::{BlockId, DriveIdentity};

/// Coarse error class used by callers to pick an exit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Missing file, permission denied.
    Input,
    /// Corrupt manifest, short block, unknown probe version.
    Format,
    /// Inputs are individually valid but inconsistent (identity mismatch).
    Semantic,
    /// Malformed rule or rule-set.
    Rule,
    /// Broken internal assumption.
    Internal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Format => "format",
            Self::Semantic => "semantic",
            Self::Rule => "rule",
            Self::Internal => "internal",
        })
    }
}

/// Failure to materialize a snapshot bundle.
#[derive(Debug, Error)]
pub enum LoadError {
    /// `manifest.json` does not exist in the bundle directory.
    #[error("no manifest.json in {}", dir.display())]
    MissingManifest {
        /// Bundle directory.
        dir: PathBuf,
    },
    /// The manifest is not valid JSON or violates its schema.
    #[error("corrupt manifest {}: {reason}", path.display())]
    CorruptManifest {
        /// Manifest file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
    /// The probe that wrote the bundle speaks a format we do not read.
    #[error("unsupported probe version `{version}`")]
    UnsupportedProbeVersion {
        /// Version string from the manifest.
        version: String,
    },
    /// A raw block failed its length or checksum check.
    #[error("corrupt block `{block}`: {reason}")]
    CorruptBlock {
        /// Offending block.
        block: BlockId,
        /// What was wrong.
        reason: String,
    },
    /// Reading a file failed.
    #[error("failed to read {}", path.display())]
    IoFailure {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Two bundles describe different drives.
    #[error("drive identity mismatch: before {before}, after {after}")]
    DriveIdentityMismatch {
        /// Identity of the first bundle.
        before: Box<DriveIdentity>,
        /// Identity of the second bundle.
        after: Box<DriveIdentity>,
    },
}

impl LoadError {
    /// Taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingManifest { .. } | Self::IoFailure { .. } => ErrorClass::Input,
            Self::CorruptManifest { .. }
            | Self::UnsupportedProbeVersion { .. }
            | Self::CorruptBlock { .. } => ErrorClass::Format,
            Self::DriveIdentityMismatch { .. } => ErrorClass::Semantic,
        }
    }
}

/// Catastrophic decode failure.
///
/// Per-field problems never surface here; they become `unknown` fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A block is too short (or otherwise unusable) to yield any field.
    #[error("undecodable block `{block}`: {reason}")]
    UndecodableBlock {
        /// Offending block.
        block: BlockId,
        /// What was wrong.
        reason: String,
    },
    /// The decoder produced an inconsistent tree.
    #[error("internal decoder error: {detail}")]
    Internal {
        /// Description of the broken assumption.
        detail: String,
    },
}

impl DecodeError {
    /// Taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UndecodableBlock { .. } => ErrorClass::Format,
            Self::Internal { .. } => ErrorClass::Internal,
        }
    }
}
