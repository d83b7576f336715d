// src/error.rs

//! Crate-wide error type
//!
//! Every failure in the packaging core maps to exactly one variant. Nothing
//! is logged and swallowed; callers see the first failure through the error
//! channel and decide how to recover.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Packaging errors
#[derive(Error, Debug)]
pub enum Error {
    /// A path is absolute where it must be relative, escapes its root,
    /// does not exist, or mismatches an expected base
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A base directory is required (absolute pattern or keep-structure)
    /// but was not supplied
    #[error("base path required but not supplied")]
    MissingBasePath,

    /// Two different additions would land at the same destination path
    #[error("duplicate destination file: {0}")]
    DuplicateFile(String),

    /// A pre-existing installation cannot be replaced under the chosen
    /// update rule
    #[error("installation '{0}' already exists and may not be replaced")]
    DuplicateInstall(String),

    /// A file scheduled for inclusion disappeared between resolution and
    /// composition
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// The install name was refused or an internal manifest invariant broke
    #[error("failed to create installation manifest for '{0}'")]
    FailedManifestCreation(String),

    /// I/O error writing `install_manifest.toml`
    #[error("failed to save installation manifest to {0}")]
    FailedSaveManifest(String),

    /// Manifest TOML cannot be parsed, lacks required fields, or carries
    /// the wrong schema version
    #[error("invalid installation manifest: {0}")]
    InvalidManifest(String),

    /// Signature missing, endian mismatch, interface-version mismatch, or
    /// a length field out of range
    #[error("incompatible package: {0}")]
    IncompatiblePackage(String),

    /// Chained or in-record checksum mismatch
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    IncorrectCrc { expected: u32, actual: u32 },

    /// The data stream ended before a required record could be read
    #[error("package truncated: needed {needed} bytes, {available} available")]
    BufferTooSmall { needed: u64, available: u64 },

    #[error("cannot create directory: {0}")]
    CannotCreateDir(String),

    #[error("cannot remove directory: {0}")]
    CannotRemoveDir(String),

    #[error("cannot open file: {0}")]
    CannotOpenFile(String),

    #[error("file corrupt: {0}")]
    FileCorrupt(String),
}

impl Error {
    /// Shorthand for the path-carrying variants
    pub(crate) fn invalid_path(path: impl AsRef<std::path::Path>) -> Self {
        Error::InvalidPath(path.as_ref().display().to_string())
    }
}
