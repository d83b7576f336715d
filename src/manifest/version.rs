// src/manifest/version.rs

//! Package version parsing and comparison
//!
//! A package version is a `major.minor.patch` triple of unsigned integers
//! read from the `Version` property. Parsing is forgiving: each dot-field
//! contributes its longest leading run of decimal digits, anything else
//! counts as zero, missing fields default to zero. Ordering is strict
//! lexicographic on the triple.

use std::fmt;

/// A `(major, minor, patch)` package version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PackageVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PackageVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string. Never fails; unparseable fields read as 0.
    ///
    /// `"1.2.3"` → (1,2,3), `"2.5"` → (2,5,0), `"7.1b.3"` → (7,1,3),
    /// `"abc"` → (0,0,0). A fourth field and beyond is ignored.
    pub fn parse(text: &str) -> Self {
        let mut fields = text.split('.').map(leading_number);
        Self {
            major: fields.next().unwrap_or(0),
            minor: fields.next().unwrap_or(0),
            patch: fields.next().unwrap_or(0),
        }
    }
}

/// Longest leading run of decimal digits, saturating on overflow.
fn leading_number(field: &str) -> u32 {
    let digits: String = field.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u32::MAX)
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
