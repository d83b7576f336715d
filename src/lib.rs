// src/lib.rs

//! SDV component installation packager
//!
//! Composes, verifies, extracts and directly installs installation
//! packages: self-contained, integrity-checked archives bundling a set of
//! module binaries with a TOML installation manifest.
//!
//! # Architecture
//!
//! - Chained checksums: a CRC-32C value threads through every package
//!   byte; each record carries its seed so it can be checked in isolation
//! - Manifest-first: the installation manifest travels in the package
//!   header and is written to the install tree before any file record
//! - Version-gated updates: replacing an existing installation is decided
//!   by an explicit update rule against the installed manifest's version
//! - Single-threaded by contract: separate `Composer` and manifest
//!   instances are independent; one instance is not for concurrent use

mod error;
pub mod fsattr;
pub mod introspect;
pub mod manifest;
pub mod package;
pub mod pathmatch;

pub use error::{Error, Result};
pub use manifest::{
    Component, ComponentType, InstallManifest, PackageVersion, INTERFACE_VERSION,
    MANIFEST_FILE_NAME,
};
pub use package::{
    extract, extract_from_file, extract_manifest, extract_manifest_from_file,
    package_creation_time, remove, verify, verify_file, AddModuleFlags, Composer, UpdateRule,
};
