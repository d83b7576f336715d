// tests/direct_install.rs

//! Direct installation (compose without the wire format)

mod common;

use common::{scenario_tree, touch, tree_paths, tree_snapshot};
use sdvpack::{AddModuleFlags, Composer, Error, InstallManifest, UpdateRule, MANIFEST_FILE_NAME};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn scenario_composer(src: &Path, keep_structure: bool) -> Composer {
    let mut composer = Composer::new();
    let flags = AddModuleFlags {
        regex: false,
        keep_structure,
    };
    composer
        .add_module(src, "", Path::new("."), flags)
        .unwrap();
    composer.add_property("Version", "1.0.0");
    composer
}

#[test]
fn direct_install_creates_tree_with_manifest() {
    let src = scenario_tree();
    let composer = scenario_composer(src.path(), true);
    let root = TempDir::new().unwrap();

    let manifest = composer
        .compose_direct("Direct", root.path(), UpdateRule::NotAllowed)
        .unwrap();
    assert_eq!(manifest.install_dir(), root.path().join("Direct"));

    assert_eq!(
        tree_paths(&root.path().join("Direct")),
        vec![
            "a.bin".to_string(),
            MANIFEST_FILE_NAME.to_string(),
            "sub/b.bin".to_string(),
            "sub/c.bin".to_string(),
        ]
    );

    let on_disk = InstallManifest::load(&root.path().join("Direct"), false).unwrap();
    assert_eq!(on_disk.install_name(), "Direct");
    assert_eq!(on_disk.modules().len(), 3);
}

#[test]
fn direct_install_respects_update_rule() {
    let src = scenario_tree();
    let root = TempDir::new().unwrap();

    let composer = scenario_composer(src.path(), false);
    composer
        .compose_direct("Direct", root.path(), UpdateRule::NotAllowed)
        .unwrap();

    // Second run under not-allowed fails
    assert!(matches!(
        composer.compose_direct("Direct", root.path(), UpdateRule::NotAllowed),
        Err(Error::DuplicateInstall(_))
    ));

    // Same version under update-when-new fails too
    assert!(matches!(
        composer.compose_direct("Direct", root.path(), UpdateRule::UpdateWhenNew),
        Err(Error::DuplicateInstall(_))
    ));

    // A newer version passes
    let mut newer = scenario_composer(src.path(), false);
    newer.add_property("Version", "1.0.1");
    newer
        .compose_direct("Direct", root.path(), UpdateRule::UpdateWhenNew)
        .unwrap();
}

#[test]
fn direct_install_overwrite_is_idempotent() {
    let src = scenario_tree();
    let composer = scenario_composer(src.path(), true);
    let root = TempDir::new().unwrap();

    composer
        .compose_direct("Direct", root.path(), UpdateRule::Overwrite)
        .unwrap();
    let first = tree_snapshot(&root.path().join("Direct"));

    composer
        .compose_direct("Direct", root.path(), UpdateRule::Overwrite)
        .unwrap();
    let second = tree_snapshot(&root.path().join("Direct"));

    assert_eq!(first, second);
}

#[test]
fn direct_install_preserves_attributes() {
    let src = scenario_tree();
    let tool = src.path().join("tool.bin");
    touch(&tool, b"#!/bin/sh\n");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();
    }
    let stamp = 1_600_000_000_500_000u64;
    sdvpack::fsattr::set_modify_time(&tool, stamp);

    let composer = scenario_composer(src.path(), false);
    let root = TempDir::new().unwrap();
    composer
        .compose_direct("Direct", root.path(), UpdateRule::NotAllowed)
        .unwrap();

    let installed = root.path().join("Direct/tool.bin");
    assert_eq!(
        sdvpack::fsattr::is_executable(&installed),
        sdvpack::fsattr::is_executable(&tool)
    );
    assert_eq!(sdvpack::fsattr::modify_time(&installed), stamp);
}

#[test]
fn direct_install_manifest_is_stamped_fresh() {
    let src = scenario_tree();
    let composer = scenario_composer(src.path(), false);
    let root = TempDir::new().unwrap();

    let before = sdvpack::fsattr::now_micros();
    composer
        .compose_direct("Direct", root.path(), UpdateRule::NotAllowed)
        .unwrap();
    let after = sdvpack::fsattr::now_micros();

    let manifest_file = root.path().join("Direct").join(MANIFEST_FILE_NAME);
    let stamp = sdvpack::fsattr::modify_time(&manifest_file);
    assert!(stamp >= before && stamp <= after, "stamp {} outside [{}, {}]", stamp, before, after);
}

#[test]
fn remove_after_direct_install() {
    let src = scenario_tree();
    let composer = scenario_composer(src.path(), false);
    let root = TempDir::new().unwrap();
    composer
        .compose_direct("Direct", root.path(), UpdateRule::NotAllowed)
        .unwrap();

    let record = sdvpack::remove("Direct", root.path()).unwrap();
    assert!(record.is_valid());
    assert!(!root.path().join("Direct").exists());

    // Removing again yields the empty record
    let again = sdvpack::remove("Direct", root.path()).unwrap();
    assert!(!again.is_valid());
}
