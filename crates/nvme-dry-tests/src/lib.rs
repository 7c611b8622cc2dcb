// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for the NVMe information crates.
//!
//! # Modules
//!
//! - [`blocks`] - Raw NVMe block builders (Identify, SMART, logs, features)
//! - [`bundle`] - Snapshot bundle builder, in-memory or written to disk
//! - [`config`] - In-memory config store fake for testing without filesystem
#![forbid(unsafe_code)]

pub mod blocks;
pub mod bundle;
pub mod config;

// Re-export commonly used items at crate root for convenience
pub use blocks::{
    error_log, feature_dword, firmware_slots, selftest_log, telemetry_header, ErrorEntry,
    IdentifyControllerBuilder, NamespaceBuilder, SmartLogBuilder,
};
pub use bundle::{BundleBuilder, ChecksumScheme};
pub use config::InMemoryConfigStore;
