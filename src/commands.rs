// src/commands.rs

//! Command implementations for the sdvpack CLI
//!
//! Thin handlers over the library: argument unpacking, summaries on
//! stdout, errors up to main. No packaging logic lives here.

use crate::cli::{ModuleSpec, PropertyArgs};
use anyhow::{bail, Context, Result};
use chrono::DateTime;
use sdvpack::{AddModuleFlags, Composer, InstallManifest, UpdateRule};
use std::path::Path;

/// Shared composer setup for `pack`, `install` and `manifest`.
fn build_composer(
    base: &str,
    modules: &[ModuleSpec],
    properties: &PropertyArgs,
    keep_structure: bool,
    trust_modules: bool,
) -> Result<Composer> {
    let mut composer = Composer::new();
    composer.trust_modules(trust_modules);

    for spec in modules {
        let flags = AddModuleFlags {
            regex: spec.regex,
            keep_structure,
        };
        let added = composer
            .add_module(
                Path::new(base),
                &spec.pattern,
                Path::new(&spec.target_dir),
                flags,
            )
            .with_context(|| format!("adding modules for pattern '{}'", spec.pattern))?;
        if added.is_empty() {
            eprintln!("warning: pattern '{}' matched no files", spec.pattern);
        }
    }

    for (name, value) in [
        ("Product", &properties.product),
        ("Description", &properties.description),
        ("Author", &properties.author),
        ("Copyrights", &properties.copyright),
        ("Version", &properties.package_version),
    ] {
        if let Some(value) = value {
            composer.add_property(name, value);
        }
    }
    for property in &properties.properties {
        let Some((name, value)) = property.split_once('=') else {
            bail!("property '{}' is not NAME=VALUE", property);
        };
        composer.add_property(name, value);
    }

    Ok(composer)
}

pub fn pack(
    name: &str,
    output: &str,
    base: &str,
    modules: &[ModuleSpec],
    properties: &PropertyArgs,
    keep_structure: bool,
    trust_modules: bool,
) -> Result<()> {
    let composer = build_composer(base, modules, properties, keep_structure, trust_modules)?;
    if composer.file_count() == 0 {
        bail!("no files matched; nothing to package");
    }
    composer
        .compose_to_file(name, Path::new(output))
        .with_context(|| format!("composing package '{}'", name))?;
    println!(
        "Packaged '{}' ({} files) into {}",
        name,
        composer.file_count(),
        output
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn install(
    name: &str,
    root: &str,
    base: &str,
    modules: &[ModuleSpec],
    properties: &PropertyArgs,
    keep_structure: bool,
    trust_modules: bool,
    update_rule: UpdateRule,
) -> Result<()> {
    let composer = build_composer(base, modules, properties, keep_structure, trust_modules)?;
    if composer.file_count() == 0 {
        bail!("no files matched; nothing to install");
    }
    let manifest = composer
        .compose_direct(name, Path::new(root), update_rule)
        .with_context(|| format!("installing '{}'", name))?;
    println!(
        "Installed '{}' at {}",
        manifest.install_name(),
        manifest.install_dir().display()
    );
    Ok(())
}

pub fn manifest(
    name: &str,
    output: Option<&str>,
    base: &str,
    modules: &[ModuleSpec],
    properties: &PropertyArgs,
    keep_structure: bool,
    trust_modules: bool,
) -> Result<()> {
    let composer = build_composer(base, modules, properties, keep_structure, trust_modules)?;
    let manifest = composer
        .compose_manifest(name)
        .with_context(|| format!("building manifest for '{}'", name))?;
    let text = manifest.write();
    match output {
        Some(path) => {
            std::fs::write(path, &text).with_context(|| format!("writing {}", path))?;
            println!("Wrote manifest for '{}' to {}", name, path);
        }
        None => print!("{}", text),
    }
    Ok(())
}

pub fn extract(package: &str, root: &str, update_rule: UpdateRule) -> Result<()> {
    let manifest = sdvpack::extract_from_file(Path::new(package), Path::new(root), update_rule)
        .with_context(|| format!("extracting {}", package))?;
    println!(
        "Extracted '{}' to {}",
        manifest.install_name(),
        manifest.install_dir().display()
    );
    Ok(())
}

pub fn verify(package: &str) -> Result<()> {
    match sdvpack::verify_file(Path::new(package)) {
        Ok(()) => {
            println!("{}: OK", package);
            Ok(())
        }
        Err(e) => bail!("{}: FAILED ({})", package, e),
    }
}

pub fn show(package: &str, raw: bool) -> Result<()> {
    let manifest = sdvpack::extract_manifest_from_file(Path::new(package))
        .with_context(|| format!("reading {}", package))?;

    if raw {
        print!("{}", manifest.write());
        return Ok(());
    }

    print_manifest_summary(&manifest);

    // Header timestamp, rendered separately from the manifest body
    let created = sdvpack::package_creation_time(Path::new(package))?;
    if created > 0 {
        let stamp = DateTime::from_timestamp_micros(created as i64)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| created.to_string());
        println!("Created:      {}", stamp);
    }
    Ok(())
}

fn print_manifest_summary(manifest: &InstallManifest) {
    println!("Installation: {}", manifest.install_name());
    println!("Version:      {}", manifest.version());

    let properties: Vec<_> = manifest.properties().collect();
    if !properties.is_empty() {
        println!("Properties:");
        for (name, value) in properties {
            println!("  {} = {}", name, value);
        }
    }

    if !manifest.modules().is_empty() {
        println!("Modules:");
        for module in manifest.modules() {
            println!("  {}", module.rel_path.display());
            for component in &module.components {
                let mut line = format!(
                    "    {} ({})",
                    component.class_name,
                    component.component_type.manifest_key()
                );
                if component.singleton {
                    line.push_str(" [singleton]");
                }
                println!("{}", line);
            }
        }
    }
}

pub fn remove(name: &str, root: &str) -> Result<()> {
    let manifest =
        sdvpack::remove(name, Path::new(root)).with_context(|| format!("removing '{}'", name))?;
    if manifest.is_valid() {
        println!("Removed '{}' ({} modules)", name, manifest.modules().len());
    } else {
        println!("No installation '{}' under {}", name, root);
    }
    Ok(())
}
