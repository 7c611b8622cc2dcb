// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Analysis config persisted through the `ConfigStore` port.

use nvme_dry_tests::{BundleBuilder, InMemoryConfigStore};
use nvme_info::config::ANALYSIS_KEY;
use nvme_info::{
    decode_with, AnalysisConfig, ComparePolicy, ConfigError, ConfigService, PathPattern, Value,
};

fn rated() -> AnalysisConfig {
    let mut cfg = AnalysisConfig::default();
    cfg.rating.tbw_tb = Some(600.0);
    cfg.compare_overrides.insert(
        PathPattern::parse("vendor.c0").unwrap(),
        ComparePolicy::Monotonic,
    );
    cfg.compare_mask.push(PathPattern::parse("namespace.*").unwrap());
    cfg
}

#[test]
fn missing_analysis_config_is_default() {
    let store = InMemoryConfigStore::new();
    let svc = ConfigService::new(store.clone());
    assert_eq!(svc.analysis().unwrap(), AnalysisConfig::default());
    assert_eq!(store.load_count(), 1);
}

#[test]
fn analysis_config_round_trips_through_store() {
    let store = InMemoryConfigStore::new();
    let svc = ConfigService::new(store.clone());
    svc.save(ANALYSIS_KEY, &rated()).unwrap();
    assert_eq!(store.keys(), vec![ANALYSIS_KEY.to_owned()]);
    assert_eq!(svc.analysis().unwrap(), rated());
}

#[test]
fn stored_rating_reaches_the_deriver() {
    let svc = ConfigService::new(InMemoryConfigStore::with_analysis(&rated()));
    let config = svc.analysis().unwrap();
    let tree = decode_with(&BundleBuilder::healthy().snapshot(), &config).unwrap();
    assert!(matches!(
        tree.value("wear.tbw_used_fraction"),
        Some(Value::Real(_))
    ));
}

#[test]
fn store_failures_propagate() {
    let store = InMemoryConfigStore::new();
    let svc = ConfigService::new(store.clone());
    store.set_fail_on_save(true);
    assert!(matches!(
        svc.save(ANALYSIS_KEY, &rated()),
        Err(ConfigError::Other(_))
    ));
    store.set_fail_on_load(true);
    assert!(matches!(svc.analysis(), Err(ConfigError::Other(_))));
    assert_eq!((store.save_count(), store.load_count()), (1, 1));
    assert!(store.keys().is_empty());
}

#[test]
fn empty_blob_is_treated_as_missing() {
    let svc = ConfigService::new(InMemoryConfigStore::with_raw(ANALYSIS_KEY, b""));
    assert_eq!(svc.analysis().unwrap(), AnalysisConfig::default());
}
