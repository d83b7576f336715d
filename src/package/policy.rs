// src/package/policy.rs

//! Update rules for pre-existing installations

use crate::manifest::{InstallManifest, PackageVersion, MANIFEST_FILE_NAME};
use std::path::Path;
use tracing::debug;

/// How to treat an installation already present at the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateRule {
    /// Never replace an existing installation
    #[default]
    NotAllowed,
    /// Replace only when the incoming version is strictly newer
    UpdateWhenNew,
    /// Always replace
    Overwrite,
}

impl UpdateRule {
    /// Decide whether the installation at `install_dir` may be replaced
    /// by a package of version `new_version`.
    ///
    /// Under [`UpdateRule::UpdateWhenNew`] a directory without a readable
    /// manifest compares as version 0.0.0; an unreadable manifest refuses
    /// the update outright.
    pub(crate) fn allows_replacing(self, install_dir: &Path, new_version: PackageVersion) -> bool {
        match self {
            UpdateRule::Overwrite => true,
            UpdateRule::NotAllowed => false,
            UpdateRule::UpdateWhenNew => {
                if !install_dir.join(MANIFEST_FILE_NAME).is_file() {
                    return new_version > PackageVersion::default();
                }
                match InstallManifest::load(install_dir, false) {
                    Ok(old) => {
                        let old_version = old.version();
                        debug!(
                            "existing installation at {} has version {}, incoming {}",
                            install_dir.display(),
                            old_version,
                            new_version
                        );
                        new_version > old_version
                    }
                    // Broken installation; refuse to update over it
                    Err(_) => false,
                }
            }
        }
    }
}

impl std::str::FromStr for UpdateRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not-allowed" => Ok(Self::NotAllowed),
            "update-when-new" => Ok(Self::UpdateWhenNew),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(format!(
                "unknown update rule '{}' (expected not-allowed, update-when-new or overwrite)",
                other
            )),
        }
    }
}
