// src/package/extractor.rs

//! Package extraction and verification
//!
//! Reverses the serializer: validates the header, walks the records while
//! the running CRC threads along, and either materializes the files into
//! an installation tree (extract) or discards the payloads (verify).
//! Destination paths from the package are untrusted and rejected when
//! they would escape the installation directory.

use crate::error::{Error, Result};
use crate::fsattr;
use crate::manifest::InstallManifest;
use crate::package::composer::{dir_is_occupied, store_manifest};
use crate::package::policy::UpdateRule;
use crate::package::wire::{self, ChainReader, FileRecord, Record};
use crate::pathmatch;
use std::fs;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tracing::{debug, info};

/// Extract a package held in memory into `install_root/<install name>`.
pub fn extract(
    package: &[u8],
    install_root: &Path,
    rule: UpdateRule,
) -> Result<InstallManifest> {
    let mut reader = ChainReader::new(Cursor::new(package));
    extract_impl(&mut reader, install_root, rule)
}

/// Extract a package file into `install_root/<install name>`.
pub fn extract_from_file(
    package_path: &Path,
    install_root: &Path,
    rule: UpdateRule,
) -> Result<InstallManifest> {
    let file = fs::File::open(package_path)
        .map_err(|_| Error::CannotOpenFile(package_path.display().to_string()))?;
    let mut reader = ChainReader::new(BufReader::new(file));
    extract_impl(&mut reader, install_root, rule)
}

/// Check the integrity of a package held in memory without writing
/// anything. `Ok(())` means every checksum closed.
pub fn verify(package: &[u8]) -> Result<()> {
    let mut reader = ChainReader::new(Cursor::new(package));
    verify_impl(&mut reader)
}

/// Check the integrity of a package file without writing anything.
pub fn verify_file(package_path: &Path) -> Result<()> {
    let file = fs::File::open(package_path)
        .map_err(|_| Error::CannotOpenFile(package_path.display().to_string()))?;
    let mut reader = ChainReader::new(BufReader::new(file));
    verify_impl(&mut reader)
}

/// Read only the embedded installation manifest of an in-memory package.
pub fn extract_manifest(package: &[u8]) -> Result<InstallManifest> {
    let mut reader = ChainReader::new(Cursor::new(package));
    read_manifest(&mut reader).map(|(manifest, _)| manifest)
}

/// Read only the embedded installation manifest of a package file.
pub fn extract_manifest_from_file(package_path: &Path) -> Result<InstallManifest> {
    let file = fs::File::open(package_path)
        .map_err(|_| Error::CannotOpenFile(package_path.display().to_string()))?;
    let mut reader = ChainReader::new(BufReader::new(file));
    read_manifest(&mut reader).map(|(manifest, _)| manifest)
}

/// Creation timestamp recorded in a package file's header, in
/// microseconds since the Unix epoch.
pub fn package_creation_time(package_path: &Path) -> Result<u64> {
    let file = fs::File::open(package_path)
        .map_err(|_| Error::CannotOpenFile(package_path.display().to_string()))?;
    let mut reader = ChainReader::new(BufReader::new(file));
    read_manifest(&mut reader).map(|(_, header)| header.created_micros)
}

/// Remove an installation below `install_root`.
///
/// Returns the manifest of what was removed; it is a removal record, not
/// a live handle. When no readable manifest exists at the target, nothing
/// is deleted and the returned manifest is empty (invalid).
pub fn remove(install_name: &str, install_root: &Path) -> Result<InstallManifest> {
    let target_dir = install_root.join(install_name);

    let manifest = match InstallManifest::load(&target_dir, false) {
        Ok(manifest) => manifest,
        Err(e) => {
            debug!(
                "no removable installation at {}: {}",
                target_dir.display(),
                e
            );
            return Ok(InstallManifest::default());
        }
    };

    if dir_is_occupied(&target_dir)? {
        fs::remove_dir_all(&target_dir)
            .map_err(|_| Error::CannotRemoveDir(target_dir.display().to_string()))?;
        info!("removed installation '{}'", install_name);
    }

    Ok(manifest)
}

/// Header + manifest validation shared by every read path.
fn read_manifest<R: Read>(
    reader: &mut ChainReader<R>,
) -> Result<(InstallManifest, wire::PackageHeader)> {
    let header = wire::read_header(reader)?;
    let manifest = InstallManifest::from_toml(&header.manifest_text, false)?;
    Ok((manifest, header))
}

fn extract_impl<R: Read>(
    reader: &mut ChainReader<R>,
    install_root: &Path,
    rule: UpdateRule,
) -> Result<InstallManifest> {
    let (mut manifest, header) = read_manifest(reader)?;
    let target_dir = install_root.join(manifest.install_name());

    if dir_is_occupied(&target_dir)? {
        if !rule.allows_replacing(&target_dir, manifest.version()) {
            return Err(Error::DuplicateInstall(manifest.install_name().to_string()));
        }
        fs::remove_dir_all(&target_dir)
            .map_err(|_| Error::CannotRemoveDir(target_dir.display().to_string()))?;
    }

    fs::create_dir_all(&target_dir)
        .map_err(|_| Error::CannotCreateDir(target_dir.display().to_string()))?;

    store_manifest(&mut manifest, &target_dir, header.created_micros)?;

    loop {
        match wire::read_record(reader)? {
            Record::BinaryFile(file) => store_file_record(&file, &target_dir)?,
            Record::Final => break,
            Record::Unknown => debug!("skipping record of unknown type"),
        }
    }

    wire::read_footer(reader)?;

    info!(
        "extracted installation '{}' to {}",
        manifest.install_name(),
        target_dir.display()
    );
    Ok(manifest)
}

fn verify_impl<R: Read>(reader: &mut ChainReader<R>) -> Result<()> {
    let (_manifest, _header) = read_manifest(reader)?;

    loop {
        match wire::read_record(reader)? {
            Record::BinaryFile(_) | Record::Unknown => {}
            Record::Final => break,
        }
    }

    wire::read_footer(reader)
}

/// Write one packaged file below the installation directory, restoring
/// its attributes and times (read-only last).
fn store_file_record(file: &FileRecord, target_dir: &Path) -> Result<()> {
    let rel = Path::new(&file.rel_path);
    if rel.is_absolute() || pathmatch::escapes_root(rel) {
        return Err(Error::InvalidPath(file.rel_path.clone()));
    }
    let dest = target_dir.join(pathmatch::normalize_rel(rel));

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .map_err(|_| Error::CannotCreateDir(parent.display().to_string()))?;
    }
    fs::write(&dest, &file.content)
        .map_err(|_| Error::CannotOpenFile(dest.display().to_string()))?;

    fsattr::set_create_time(&dest, file.created_micros);
    fsattr::set_modify_time(&dest, file.modified_micros);
    if file.executable {
        fsattr::set_executable(&dest);
    }
    if file.readonly {
        fsattr::set_readonly(&dest);
    }
    Ok(())
}
