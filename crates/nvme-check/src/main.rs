// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! nvme-check: inspect, verify and diff NVMe snapshot bundles.
//!
//! Exit codes: `0` success, `1` a non-`info` rule failed, `2` usage, config,
//! rule-file or unreadable-input error, `3` a snapshot is malformed, could not
//! be decoded, or the pair describes different drives.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use nvme_config_fs::FsConfigStore;
use nvme_info::{
    decode_with, diff_masked, load, load_pair, AnalysisConfig, CompareMask, ConfigService,
    ConfigStore, DecodeError, ErrorClass, InfoTree, LoadError, PathPattern,
};
use nvme_rules::{verify, verify_pair, RuleSet, Verdict, VerdictSummary};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "nvme-check", version, about = "Inspect, verify and diff NVMe snapshot bundles")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Analysis config file (JSON); defaults to the platform config dir.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the decoded and derived information tree.
    Info {
        /// Snapshot bundle directory.
        snapshot: PathBuf,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Evaluate rules against a snapshot (or a before/after pair).
    Verify {
        /// Snapshot bundle directory.
        snapshot: PathBuf,
        /// Earlier snapshot of the same drive; enables drift rules.
        #[arg(long, value_name = "SNAPSHOT")]
        before: Option<PathBuf>,
        /// Rule file replacing the built-in rule-sets.
        #[arg(long, value_name = "FILE")]
        rules: Option<PathBuf>,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Report changes between two snapshots of the same drive.
    Diff {
        /// Earlier snapshot.
        before: PathBuf,
        /// Later snapshot.
        after: PathBuf,
        /// Path pattern to suppress (repeatable).
        #[arg(long = "mask", value_name = "PATTERN")]
        masks: Vec<String>,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn analysis_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let store = match path {
        Some(path) => FsConfigStore::file(path),
        None => match FsConfigStore::new() {
            Ok(store) => store,
            Err(err) => {
                debug!(error = %err, "no platform config dir; using defaults");
                return Ok(AnalysisConfig::default());
            }
        },
    };
    let location = store.location().to_path_buf();
    read_analysis(store, &location)
}

fn read_analysis(store: impl ConfigStore, location: &Path) -> Result<AnalysisConfig> {
    ConfigService::new(store)
        .analysis()
        .with_context(|| format!("failed to read config {}", location.display()))
}

fn decode_bundle(path: &Path, config: &AnalysisConfig) -> Result<InfoTree> {
    let snapshot = load(path).with_context(|| format!("failed to load {}", path.display()))?;
    decode_with(&snapshot, config).with_context(|| format!("failed to decode {}", path.display()))
}

fn decode_pair(
    before: &Path,
    after: &Path,
    config: &AnalysisConfig,
) -> Result<(InfoTree, InfoTree)> {
    let (b, a) = load_pair(before, after).with_context(|| {
        format!("failed to load {} and {}", before.display(), after.display())
    })?;
    let b = decode_with(&b, config)
        .with_context(|| format!("failed to decode {}", before.display()))?;
    let a = decode_with(&a, config)
        .with_context(|| format!("failed to decode {}", after.display()))?;
    Ok((b, a))
}

fn rule_set(path: Option<&Path>, pair: bool) -> Result<RuleSet> {
    let Some(path) = path else {
        let rules = RuleSet::health();
        return if pair {
            Ok(rules.merged(RuleSet::changes())?)
        } else {
            Ok(rules)
        };
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rules {}", path.display()))?;
    RuleSet::parse(&source).with_context(|| format!("invalid rules in {}", path.display()))
}

#[derive(Serialize)]
struct VerifyReport<'a> {
    verdicts: &'a [Verdict],
    summary: VerdictSummary,
}

fn emit_json(value: &impl Serialize) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn emit_text(text: &str) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{text}")?;
    Ok(())
}

fn run(cli: Cli) -> Result<u8> {
    let config = analysis_config(cli.config.as_deref())?;
    match cli.command {
        Command::Info { snapshot, json } => {
            let tree = decode_bundle(&snapshot, &config)?;
            info!(fields = tree.len(), "decoded snapshot");
            if json {
                emit_json(&tree)?;
            } else {
                emit_text(&render::tree_table(&tree))?;
            }
            Ok(0)
        }
        Command::Verify {
            snapshot,
            before,
            rules,
            json,
        } => {
            let rules = rule_set(rules.as_deref(), before.is_some())?;
            let verdicts = match before.as_deref() {
                Some(before) => {
                    let (b, a) = decode_pair(before, &snapshot, &config)?;
                    verify_pair(&b, &a, &rules)
                }
                None => verify(&decode_bundle(&snapshot, &config)?, &rules),
            };
            let summary = VerdictSummary::of(&verdicts);
            info!(%summary, "verification finished");
            if json {
                emit_json(&VerifyReport {
                    verdicts: &verdicts,
                    summary,
                })?;
            } else {
                emit_text(&render::verdict_table(&verdicts))?;
                emit_text(&summary.to_string())?;
            }
            Ok(u8::from(summary.exit_code() != 0))
        }
        Command::Diff {
            before,
            after,
            masks,
            json,
        } => {
            let mut mask = CompareMask::from_config(&config);
            for raw in &masks {
                let pattern = PathPattern::parse(raw)
                    .with_context(|| format!("invalid --mask pattern `{raw}`"))?;
                mask.push(pattern);
            }
            let (b, a) = decode_pair(&before, &after, &config)?;
            let changes = diff_masked(&b, &a, &mask);
            info!(changes = changes.len(), "diff finished");
            if json {
                emit_json(&changes)?;
            } else if changes.is_empty() {
                emit_text("no changes")?;
            } else {
                emit_text(&render::change_table(&changes))?;
            }
            Ok(0)
        }
    }
}

/// Unreadable inputs and usage problems exit 2; malformed or mismatched
/// snapshots exit 3.
fn failure_code(err: &anyhow::Error) -> u8 {
    let class = err.chain().find_map(|cause| {
        cause
            .downcast_ref::<LoadError>()
            .map(LoadError::class)
            .or_else(|| cause.downcast_ref::<DecodeError>().map(DecodeError::class))
    });
    match class {
        Some(ErrorClass::Format | ErrorClass::Semantic | ErrorClass::Internal) => 3,
        Some(ErrorClass::Input | ErrorClass::Rule) | None => 2,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            let _ = writeln!(io::stderr(), "error: {err:#}");
            ExitCode::from(failure_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvme_dry_tests::InMemoryConfigStore;
    use nvme_info::config::ANALYSIS_KEY;
    use nvme_info::BlockId;

    #[test]
    fn config_load_failure_is_a_usage_error() {
        let store = InMemoryConfigStore::new();
        store.set_fail_on_load(true);
        let err = read_analysis(store.clone(), Path::new("mem")).unwrap_err();
        assert_eq!(failure_code(&err), 2);
        assert!(format!("{err:#}").contains("simulated load failure"), "{err:#}");
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn stored_analysis_config_is_read() {
        let mut config = AnalysisConfig::default();
        config.rating.tbw_tb = Some(600.0);
        let store = InMemoryConfigStore::with_analysis(&config);
        assert_eq!(read_analysis(store.clone(), Path::new("mem")).unwrap(), config);
        assert_eq!(store.keys(), vec![ANALYSIS_KEY.to_owned()]);

        let corrupt = InMemoryConfigStore::with_raw(ANALYSIS_KEY, b"{\"rating\": 5}");
        let err = read_analysis(corrupt, Path::new("mem")).unwrap_err();
        assert_eq!(failure_code(&err), 2);
    }

    #[test]
    fn exit_code_follows_error_class() {
        let missing = anyhow::Error::new(LoadError::MissingManifest {
            dir: PathBuf::from("nope"),
        })
        .context("failed to load nope");
        assert_eq!(failure_code(&missing), 2);
        let corrupt = anyhow::Error::new(LoadError::CorruptBlock {
            block: BlockId::Smart,
            reason: "crc32 mismatch".into(),
        });
        assert_eq!(failure_code(&corrupt), 3);
        let undecodable = anyhow::Error::new(DecodeError::UndecodableBlock {
            block: BlockId::Smart,
            reason: "short".into(),
        });
        assert_eq!(failure_code(&undecodable), 3);
        assert_eq!(failure_code(&anyhow::anyhow!("bad flag")), 2);
    }
}
