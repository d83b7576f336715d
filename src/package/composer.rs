// src/package/composer.rs

//! Package composition
//!
//! A [`Composer`] accumulates file entries (resolved through wildcard or
//! regex patterns) and manifest properties, then emits the result either
//! as package bytes, as a package file, or directly into an installation
//! tree. Records land in the package in exactly the order the entries
//! were added.

use crate::error::{Error, Result};
use crate::fsattr;
use crate::manifest::{InstallManifest, PackageVersion};
use crate::package::policy::UpdateRule;
use crate::package::wire::{self, ChainWriter};
use crate::pathmatch;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options for [`Composer::add_module`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AddModuleFlags {
    /// Interpret the pattern as a regular expression instead of wildcards
    pub regex: bool,
    /// Recreate the discovered sub-directory structure below the target
    /// directory; requires a non-empty base
    pub keep_structure: bool,
}

impl AddModuleFlags {
    pub fn regex() -> Self {
        Self {
            regex: true,
            ..Self::default()
        }
    }

    pub fn keep_structure() -> Self {
        Self {
            keep_structure: true,
            ..Self::default()
        }
    }
}

/// A file scheduled for packaging: where it comes from and the relative
/// directory it lands in.
#[derive(Debug, Clone)]
struct FileEntry {
    src: PathBuf,
    rel_dir: PathBuf,
}

impl FileEntry {
    /// Destination path relative to the installation directory.
    fn destination(&self) -> PathBuf {
        match self.src.file_name() {
            Some(name) => self.rel_dir.join(name),
            None => self.rel_dir.clone(),
        }
    }
}

/// Builds installation packages
#[derive(Debug, Default)]
pub struct Composer {
    files: Vec<FileEntry>,
    properties: BTreeMap<String, String>,
    trust_modules: bool,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow loading `.sdv` modules during composition to extract their
    /// component manifests. Off by default; loading a module executes
    /// its code.
    pub fn trust_modules(&mut self, trusted: bool) -> &mut Self {
        self.trust_modules = trusted;
        self
    }

    /// Drop all collected entries and properties.
    pub fn clear(&mut self) {
        self.files.clear();
        self.properties.clear();
    }

    /// Number of files scheduled so far.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Add a property for the installation manifest. `Version` gates
    /// update decisions.
    pub fn add_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }

    /// Resolve a pattern and schedule the matched files.
    ///
    /// Returns the matched source paths; an empty match is not an error.
    /// Two entries may share a source but never a destination: a second
    /// entry landing at an already-taken `rel_target_dir/<file name>`
    /// fails with [`Error::DuplicateFile`].
    pub fn add_module(
        &mut self,
        base: &Path,
        pattern: &str,
        rel_target_dir: &Path,
        flags: AddModuleFlags,
    ) -> Result<Vec<PathBuf>> {
        if flags.keep_structure && base.as_os_str().is_empty() {
            return Err(Error::MissingBasePath);
        }
        if rel_target_dir.is_absolute() || pathmatch::escapes_root(rel_target_dir) {
            return Err(Error::invalid_path(rel_target_dir));
        }

        let matched = if flags.regex {
            pathmatch::resolve_regex(base, pattern)?
        } else {
            pathmatch::resolve_wildcards(base, pattern)?
        };

        let mut added = Vec::with_capacity(matched.len());
        for file in matched {
            // Where below the base did this file come from?
            let rel_src_dir = if !base.as_os_str().is_empty() && file.is_absolute() {
                match file.parent().and_then(|p| p.strip_prefix(base).ok()) {
                    Some(rel) => rel.to_path_buf(),
                    // Outside the base; cannot be re-rooted
                    None => continue,
                }
            } else {
                PathBuf::new()
            };

            let mut rel_dir = rel_target_dir.to_path_buf();
            if flags.keep_structure && !rel_src_dir.as_os_str().is_empty() {
                rel_dir.push(&rel_src_dir);
            }
            let rel_dir = pathmatch::normalize_rel(&rel_dir);

            let entry = FileEntry {
                src: file.clone(),
                rel_dir,
            };
            let destination = entry.destination();
            if self.files.iter().any(|e| e.destination() == destination) {
                return Err(Error::DuplicateFile(
                    pathmatch::slash_path(&destination),
                ));
            }

            debug!(
                "scheduling {} -> {}",
                entry.src.display(),
                pathmatch::slash_path(&destination)
            );
            self.files.push(entry);
            added.push(file);
        }

        Ok(added)
    }

    /// Build the installation manifest for the collected entries without
    /// emitting anything.
    pub fn compose_manifest(&self, install_name: &str) -> Result<InstallManifest> {
        let mut manifest = InstallManifest::create(install_name)?;
        for entry in &self.files {
            if !entry.src.is_file() {
                return Err(Error::ModuleNotFound(entry.src.display().to_string()));
            }
            manifest.add_module(&entry.src, &entry.rel_dir, self.trust_modules)?;
        }
        for (name, value) in &self.properties {
            manifest.set_property(name, value);
        }
        Ok(manifest)
    }

    /// Compose the package in memory.
    pub fn compose(&self, install_name: &str) -> Result<Vec<u8>> {
        let mut writer = ChainWriter::new(Vec::new());
        self.compose_into(install_name, &mut writer)?;
        Ok(writer.into_inner())
    }

    /// Compose the package into a file, streaming record by record.
    pub fn compose_to_file(&self, install_name: &str, package_path: &Path) -> Result<()> {
        let file = fs::File::create(package_path)
            .map_err(|_| Error::CannotOpenFile(package_path.display().to_string()))?;
        let mut writer = ChainWriter::new(BufWriter::new(file));
        self.compose_into(install_name, &mut writer)?;
        writer
            .into_inner()
            .flush()
            .map_err(|_| Error::CannotOpenFile(package_path.display().to_string()))?;
        info!(
            "composed package '{}' at {}",
            install_name,
            package_path.display()
        );
        Ok(())
    }

    fn compose_into<W: Write>(&self, install_name: &str, w: &mut ChainWriter<W>) -> Result<()> {
        let manifest = self.compose_manifest(install_name)?;
        let manifest_text = manifest.write();
        if manifest_text.is_empty() {
            return Err(Error::FailedManifestCreation(install_name.to_string()));
        }

        wire::write_header(w, &manifest_text, fsattr::now_micros())?;

        for entry in &self.files {
            let content = fs::read(&entry.src)
                .map_err(|_| Error::ModuleNotFound(entry.src.display().to_string()))?;
            wire::write_file_record(
                w,
                &pathmatch::slash_path(&entry.destination()),
                fsattr::is_readonly(&entry.src),
                fsattr::is_executable(&entry.src),
                fsattr::create_time(&entry.src),
                fsattr::modify_time(&entry.src),
                &content,
            )?;
        }

        wire::write_final_record(w)?;
        wire::write_footer(w)
    }

    /// Install the collected entries directly, skipping the wire format.
    ///
    /// The target is `install_root/<install_name>`. A pre-existing
    /// installation there is removed first when the update rule allows
    /// it, otherwise the call fails with [`Error::DuplicateInstall`].
    /// File attributes and times travel with the copies; the manifest
    /// file is stamped with the current time.
    pub fn compose_direct(
        &self,
        install_name: &str,
        install_root: &Path,
        rule: UpdateRule,
    ) -> Result<InstallManifest> {
        let mut manifest = self.compose_manifest(install_name)?;
        let target_dir = install_root.join(install_name);

        if dir_is_occupied(&target_dir)? {
            let new_version = self
                .properties
                .get("Version")
                .map(|v| PackageVersion::parse(v))
                .unwrap_or_default();
            if !rule.allows_replacing(&target_dir, new_version) {
                return Err(Error::DuplicateInstall(install_name.to_string()));
            }
            fs::remove_dir_all(&target_dir)
                .map_err(|_| Error::CannotRemoveDir(target_dir.display().to_string()))?;
        }

        fs::create_dir_all(&target_dir)
            .map_err(|_| Error::CannotCreateDir(target_dir.display().to_string()))?;

        store_manifest(&mut manifest, &target_dir, fsattr::now_micros())?;

        for entry in &self.files {
            let readonly = fsattr::is_readonly(&entry.src);
            let executable = fsattr::is_executable(&entry.src);
            let created = fsattr::create_time(&entry.src);
            let modified = fsattr::modify_time(&entry.src);

            let dest = target_dir.join(entry.destination());
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .map_err(|_| Error::CannotCreateDir(parent.display().to_string()))?;
            }
            fs::copy(&entry.src, &dest)
                .map_err(|_| Error::CannotOpenFile(entry.src.display().to_string()))?;

            // Attributes after content, read-only last
            fsattr::set_create_time(&dest, created);
            fsattr::set_modify_time(&dest, modified);
            if executable {
                fsattr::set_executable(&dest);
            }
            if readonly {
                fsattr::set_readonly(&dest);
            }
        }

        info!(
            "installed '{}' at {} ({} files)",
            install_name,
            target_dir.display(),
            self.files.len()
        );
        Ok(manifest)
    }
}

/// Whether the directory exists and contains at least one entry.
pub(crate) fn dir_is_occupied(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let mut entries =
        fs::read_dir(dir).map_err(|_| Error::CannotRemoveDir(dir.display().to_string()))?;
    Ok(entries.next().is_some())
}

/// Save the manifest into the installation directory and stamp the file
/// with the package creation time.
pub(crate) fn store_manifest(
    manifest: &mut InstallManifest,
    install_dir: &Path,
    created_micros: u64,
) -> Result<()> {
    manifest.save(install_dir)?;
    let path = install_dir.join(crate::manifest::MANIFEST_FILE_NAME);
    fsattr::set_create_time(&path, created_micros);
    fsattr::set_modify_time(&path, created_micros);
    Ok(())
}
