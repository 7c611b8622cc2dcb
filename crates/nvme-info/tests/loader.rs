// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Snapshot loader behavior against on-disk bundles.

use std::fs;
use std::path::{Path, PathBuf};

use nvme_dry_tests::{BundleBuilder, ChecksumScheme};
use nvme_info::{decode, load, BlockId, DecodeError, ErrorClass, LoadError};

fn write(bundle: &BundleBuilder) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = bundle.write(&dir.path().join("snap")).unwrap();
    (dir, path)
}

fn edit_manifest(dir: &Path, f: impl FnOnce(&mut serde_json::Value)) {
    let path = dir.join("manifest.json");
    let mut json: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    f(&mut json);
    fs::write(&path, serde_json::to_vec(&json).unwrap()).unwrap();
}

#[test]
fn loads_every_checksum_scheme() {
    for scheme in [
        ChecksumScheme::None,
        ChecksumScheme::Crc32,
        ChecksumScheme::Blake3,
        ChecksumScheme::Length,
    ] {
        let (_guard, path) = write(&BundleBuilder::healthy().checksum(scheme));
        let snap = load(&path).unwrap_or_else(|e| panic!("{scheme:?}: {e}"));
        assert_eq!(snap.block(&BlockId::Smart).map(<[u8]>::len), Some(512));
    }
}

#[test]
fn addenda_are_optional() {
    let mut bundle = BundleBuilder::healthy();
    let (_guard, path) = write(&bundle);
    fs::remove_file(path.join("host.txt")).unwrap();
    fs::remove_file(path.join("probe.log")).unwrap();
    let snap = load(&path).unwrap();
    assert!(snap.addenda().host_txt.is_none());
    assert!(snap.probe_log().is_none());

    bundle = bundle.probe_log("probe ok\n");
    let (_guard, path) = write(&bundle);
    assert_eq!(load(&path).unwrap().probe_log(), Some("probe ok\n"));
}

#[test]
fn missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(dir.path()).unwrap_err();
    assert!(matches!(err, LoadError::MissingManifest { .. }));
    assert_eq!(err.class(), ErrorClass::Input);
}

#[test]
fn malformed_manifest() {
    let (_guard, path) = write(&BundleBuilder::healthy());
    fs::write(path.join("manifest.json"), b"{ \"probe_version\": ").unwrap();
    let err = load(&path).unwrap_err();
    assert!(matches!(err, LoadError::CorruptManifest { .. }));
    assert_eq!(err.class(), ErrorClass::Format);
}

#[test]
fn manifest_schema_violations() {
    let cases: [(&str, fn(&mut serde_json::Value)); 5] = [
        ("unknown block id", |m| m["blocks"][0]["id"] = "identify_everything".into()),
        ("duplicate id", |m| {
            let first = m["blocks"][0].clone();
            m["blocks"].as_array_mut().unwrap().push(first);
        }),
        ("escaping file", |m| m["blocks"][0]["file"] = "../smart.bin".into()),
        ("bad checksum scheme", |m| m["blocks"][0]["checksum"] = "md5:abcd".into()),
        ("missing key", |m| {
            m.as_object_mut().unwrap().remove("drive_index");
        }),
    ];
    for (name, edit) in cases {
        let (_guard, path) = write(&BundleBuilder::healthy());
        edit_manifest(&path, edit);
        let err = load(&path).unwrap_err();
        assert!(
            matches!(err, LoadError::CorruptManifest { .. }),
            "{name}: {err:?}"
        );
    }
}

#[test]
fn unknown_manifest_keys_are_ignored() {
    let (_guard, path) = write(&BundleBuilder::healthy());
    edit_manifest(&path, |m| m["collector_build"] = "abc123".into());
    assert!(load(&path).is_ok());
}

#[test]
fn unsupported_probe_version() {
    for version in ["2.0.0", "0.9", "1.x"] {
        let (_guard, path) = write(&BundleBuilder::healthy().probe_version(version));
        match load(&path) {
            Err(LoadError::UnsupportedProbeVersion { version: v }) => assert_eq!(v, version),
            other => panic!("{version}: {other:?}"),
        }
    }
}

#[test]
fn checksum_mismatch_names_block() {
    for scheme in [ChecksumScheme::Crc32, ChecksumScheme::Blake3] {
        let (_guard, path) = write(&BundleBuilder::healthy().checksum(scheme));
        let file = path.join(BundleBuilder::file_name(&BlockId::Smart));
        let mut raw = fs::read(&file).unwrap();
        raw[5] ^= 0xff;
        fs::write(&file, raw).unwrap();
        match load(&path) {
            Err(LoadError::CorruptBlock { block, .. }) => assert_eq!(block, BlockId::Smart),
            other => panic!("{scheme:?}: {other:?}"),
        }
    }
}

#[test]
fn length_mismatch_is_corrupt_block() {
    let (_guard, path) = write(&BundleBuilder::healthy().checksum(ChecksumScheme::None));
    let file = path.join(BundleBuilder::file_name(&BlockId::FirmwareSlot));
    fs::write(&file, [0u8; 100]).unwrap();
    let err = load(&path).unwrap_err();
    assert!(matches!(
        err,
        LoadError::CorruptBlock { block: BlockId::FirmwareSlot, .. }
    ));
    assert_eq!(err.class(), ErrorClass::Format);
}

#[test]
fn missing_block_file_is_io_failure() {
    let (_guard, path) = write(&BundleBuilder::healthy());
    let file = path.join(BundleBuilder::file_name(&BlockId::ErrorLog));
    fs::remove_file(&file).unwrap();
    match load(&path) {
        Err(err @ LoadError::IoFailure { .. }) => {
            assert_eq!(err.class(), ErrorClass::Input);
            let LoadError::IoFailure { path: failed, .. } = err else {
                unreachable!()
            };
            assert_eq!(failed, file);
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn short_block_is_undecodable() {
    let snapshot = BundleBuilder::healthy()
        .block(BlockId::ErrorLog, vec![0; 10])
        .snapshot();
    let err = decode(&snapshot).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::UndecodableBlock { block: BlockId::ErrorLog, .. }
    ));
    assert_eq!(err.class(), ErrorClass::Format);
}

#[test]
fn truncated_smart_degrades_to_unknown_fields() {
    let snapshot = BundleBuilder::healthy()
        .smart(nvme_dry_tests::SmartLogBuilder::new().build()[..40].to_vec())
        .snapshot();
    let tree = decode(&snapshot).unwrap();
    assert_eq!(
        tree.value("smart.percentage_used"),
        Some(&nvme_info::Value::Int(5))
    );
    let media = tree.lookup("smart.media_errors").unwrap();
    assert_eq!(media.value(), &nvme_info::Value::Unknown);
    assert_eq!(media.provenance().error(), Some("truncated block"));
}
