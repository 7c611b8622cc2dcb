// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! nvme-info: decoder, deriver and differ for raw NVMe drive snapshots.
//!
//! The pipeline is straight-line and synchronous:
//! [`load`] a bundle into a [`Snapshot`], [`decode`] it into an [`InfoTree`]
//! (primary fields followed by derived fields), then [`diff`] two trees.
//! Rule evaluation over trees lives in the `nvme-rules` crate.
//!
//! Every stage is a pure function of its inputs: identical snapshot bytes
//! yield identical trees, and trees are never mutated after construction.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc
)]

/// Analysis configuration, config service and storage port.
pub mod config;
/// Primary block decoding.
pub mod decode;
mod derive;
mod diff;
mod error;
mod path;
/// Compare-policy classification.
pub mod policy;
/// Snapshot bundles and the loader.
pub mod snapshot;
mod tree;
/// Unit vocabulary and conversions.
pub mod units;
mod value;

pub use config::{AnalysisConfig, ConfigError, ConfigService, ConfigStore, DriveRating};
pub use decode::decode_primary;
pub use derive::derive;
pub use diff::{diff, diff_masked, Change, ChangeKind, ChangeSet, CompareMask, Sample};
pub use error::{DecodeError, ErrorClass, LoadError};
pub use path::{FieldPath, PathError, PathPattern};
pub use policy::PolicyTable;
pub use snapshot::{load, load_pair, BlockId, DriveIdentity, Snapshot};
pub use tree::{InfoTree, TreeBuilder, TreeError};
pub use units::Unit;
pub use value::{ComparePolicy, DisplayHint, DisplayStyle, Field, Provenance, Value};

use tracing::debug;

/// Decode a snapshot with the default analysis config.
pub fn decode(snapshot: &Snapshot) -> Result<InfoTree, DecodeError> {
    decode_with(snapshot, &AnalysisConfig::default())
}

/// Decode a snapshot, apply compare-policy overrides, and run derivations.
pub fn decode_with(snapshot: &Snapshot, config: &AnalysisConfig) -> Result<InfoTree, DecodeError> {
    let policies = PolicyTable::with_overrides(&config.compare_overrides);
    let primary = decode_primary(snapshot, &policies)?;
    debug!(fields = primary.len(), "primary decode complete");
    Ok(derive(primary, config))
}

/// Diff two trees using the mask configured in `config`.
pub fn diff_with(before: &InfoTree, after: &InfoTree, config: &AnalysisConfig) -> ChangeSet {
    diff_masked(before, after, &CompareMask::from_config(config))
}
