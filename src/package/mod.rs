// src/package/mod.rs

//! Installation packages
//!
//! A package is a single binary artifact: an endianness-tagged header
//! embedding the installation manifest, a sequence of file records, a
//! final marker and a footer. A CRC-32C value threads through every byte
//! of the stream; each record additionally carries the running value at
//! its start, so single records can be checked without replaying the
//! whole package.

mod composer;
mod extractor;
mod policy;
mod wire;

pub use composer::{AddModuleFlags, Composer};
pub use extractor::{extract, extract_from_file, extract_manifest, extract_manifest_from_file,
    package_creation_time, remove, verify, verify_file};
pub use policy::UpdateRule;
pub use wire::{PackageHeader, MAX_HEADER_LEN, MAX_RECORD_LEN, PACKAGE_SIGNATURE};
