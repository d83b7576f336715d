// src/cli.rs
//! CLI definitions for the sdvpack packager
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sdvpack")]
#[command(version)]
#[command(about = "SDV component installation package utility", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// A module specification: `[regex:]PATTERN[:TARGET_DIR]`, where the
/// optional target directory is relative to the installation root. The
/// `regex:` prefix switches that one pattern from wildcards to a regular
/// expression.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub pattern: String,
    pub target_dir: String,
    pub regex: bool,
}

impl std::str::FromStr for ModuleSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (regex, rest) = match s.strip_prefix("regex:") {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (pattern, target_dir) = match rest.rsplit_once(':') {
            Some((pattern, target)) if !pattern.is_empty() => (pattern, target),
            _ => (rest, "."),
        };
        if pattern.is_empty() {
            return Err("empty module pattern".to_string());
        }
        Ok(Self {
            pattern: pattern.to_string(),
            target_dir: target_dir.to_string(),
            regex,
        })
    }
}

/// Manifest properties every packaging operation may carry.
#[derive(Debug, Clone, clap::Args)]
pub struct PropertyArgs {
    /// Product name property
    #[arg(long)]
    pub product: Option<String>,

    /// Description property
    #[arg(long)]
    pub description: Option<String>,

    /// Author property
    #[arg(long)]
    pub author: Option<String>,

    /// Copyrights property
    #[arg(long)]
    pub copyright: Option<String>,

    /// Package version property (MAJOR.MINOR.PATCH); gates updates
    #[arg(long)]
    pub package_version: Option<String>,

    /// Additional manifest property NAME=VALUE; repeatable
    #[arg(short, long = "property")]
    pub properties: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose an installation package from module files
    Pack {
        /// Installation name embedded in the package
        #[arg(short, long)]
        name: String,

        /// Output package file
        #[arg(short, long)]
        output: String,

        /// Base directory patterns are resolved against
        #[arg(short, long, default_value = "")]
        base: String,

        /// Module pattern, optionally with a target directory
        /// ([regex:]PATTERN[:TARGET_DIR]); repeatable
        #[arg(short, long = "module", required = true)]
        modules: Vec<ModuleSpec>,

        #[command(flatten)]
        properties: PropertyArgs,

        /// Recreate the source directory structure below the target
        #[arg(long)]
        keep_structure: bool,

        /// Load .sdv modules to extract their component manifests
        #[arg(long)]
        trust_modules: bool,
    },

    /// Install module files directly, without producing a package
    Install {
        /// Installation name
        #[arg(short, long)]
        name: String,

        /// Installation root directory
        #[arg(short, long)]
        root: String,

        /// Base directory patterns are resolved against
        #[arg(short, long, default_value = "")]
        base: String,

        /// Module pattern, optionally with a target directory
        /// ([regex:]PATTERN[:TARGET_DIR]); repeatable
        #[arg(short, long = "module", required = true)]
        modules: Vec<ModuleSpec>,

        #[command(flatten)]
        properties: PropertyArgs,

        /// Recreate the source directory structure below the target
        #[arg(long)]
        keep_structure: bool,

        /// Load .sdv modules to extract their component manifests
        #[arg(long)]
        trust_modules: bool,

        /// How to treat an existing installation:
        /// not-allowed, update-when-new or overwrite
        #[arg(long, default_value = "not-allowed")]
        update_rule: sdvpack::UpdateRule,
    },

    /// Build an installation manifest without packaging or installing
    Manifest {
        /// Installation name
        #[arg(short, long)]
        name: String,

        /// Write the manifest here instead of printing it
        #[arg(short, long)]
        output: Option<String>,

        /// Base directory patterns are resolved against
        #[arg(short, long, default_value = "")]
        base: String,

        /// Module pattern, optionally with a target directory
        /// ([regex:]PATTERN[:TARGET_DIR]); repeatable
        #[arg(short, long = "module", required = true)]
        modules: Vec<ModuleSpec>,

        #[command(flatten)]
        properties: PropertyArgs,

        /// Recreate the source directory structure below the target
        #[arg(long)]
        keep_structure: bool,

        /// Load .sdv modules to extract their component manifests
        #[arg(long)]
        trust_modules: bool,
    },

    /// Extract a package into an installation root
    Extract {
        /// Package file to extract
        package: String,

        /// Installation root directory
        #[arg(short, long)]
        root: String,

        /// How to treat an existing installation:
        /// not-allowed, update-when-new or overwrite
        #[arg(long, default_value = "not-allowed")]
        update_rule: sdvpack::UpdateRule,
    },

    /// Verify the integrity of a package
    Verify {
        /// Package file to verify
        package: String,
    },

    /// Show the installation manifest embedded in a package
    Show {
        /// Package file to inspect
        package: String,

        /// Print the raw manifest TOML instead of a summary
        #[arg(long)]
        raw: bool,
    },

    /// Remove an installation
    Remove {
        /// Installation name to remove
        name: String,

        /// Installation root directory
        #[arg(short, long)]
        root: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_spec_with_target() {
        let spec: ModuleSpec = "sub/*.sdv:drivers".parse().unwrap();
        assert_eq!(spec.pattern, "sub/*.sdv");
        assert_eq!(spec.target_dir, "drivers");
        assert!(!spec.regex);
    }

    #[test]
    fn test_module_spec_without_target() {
        let spec: ModuleSpec = "*.bin".parse().unwrap();
        assert_eq!(spec.pattern, "*.bin");
        assert_eq!(spec.target_dir, ".");
    }

    #[test]
    fn test_module_spec_regex_prefix() {
        let spec: ModuleSpec = r"regex:sub/.*\.sdv:drivers".parse().unwrap();
        assert!(spec.regex);
        assert_eq!(spec.pattern, r"sub/.*\.sdv");
        assert_eq!(spec.target_dir, "drivers");
    }

    #[test]
    fn test_module_spec_empty_rejected() {
        assert!("".parse::<ModuleSpec>().is_err());
        assert!("regex:".parse::<ModuleSpec>().is_err());
    }
}
