// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! nvme-rules: declarative verification over NVMe information trees.
//!
//! A [`RuleSet`] is parsed from a small line-oriented language (see
//! [`RuleSet::parse`]) or taken from the built-in sets ([`RuleSet::health`],
//! [`RuleSet::changes`]). [`verify`] evaluates it against one tree and
//! [`verify_pair`] against a before/after pair, producing one [`Verdict`]
//! per rule in declaration order.
//!
//! ```
//! use nvme_rules::{verify, Outcome, RuleSet};
//! # use nvme_info::InfoTree;
//! let rules = RuleSet::parse("rule spare: smart.available_spare >= 10\n").unwrap();
//! let verdicts = verify(&InfoTree::default(), &rules);
//! assert_eq!(verdicts[0].outcome, Outcome::Skip);
//! ```
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
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc
)]

mod error;
mod eval;
mod lexer;
mod parser;
mod position;
mod rule;
mod verdict;

pub use error::{ParseErrorKind, RuleParseError};
pub use eval::{verify, verify_pair};
pub use position::Position;
pub use rule::{Comparison, Operator, Reference, Rule, RuleSet, Severity};
pub use verdict::{Observed, Outcome, Verdict, VerdictSummary};
