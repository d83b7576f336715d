// src/pathmatch.rs

//! Wildcard and regex path resolution
//!
//! Expands a base directory plus a pattern into a duplicate-free list of
//! files. The wildcard grammar:
//!
//! - `*` matches a run of zero or more characters within one path segment
//! - `**` (as a whole segment) matches zero or more segments
//! - `?` matches exactly one character within a segment
//!
//! A pattern naming a directory selects every file below it. Output order
//! is directory-traversal order of the underlying filesystem.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Check whether a relative path climbs above its root.
///
/// Tracks the depth while walking components; any point where `..` would
/// rise above depth zero escapes. `./dir1/../dir2` stays inside,
/// `dir1/../../dir2` does not.
pub fn escapes_root(rel: &Path) -> bool {
    let mut depth: i32 = 0;
    for comp in rel.components() {
        match comp {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return true,
        }
        if depth < 0 {
            return true;
        }
    }
    false
}

/// Normalize a relative path: drop `.` components, resolve `..` against
/// preceding segments. The caller must have checked `escapes_root` first.
pub fn normalize_rel(rel: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(c) => out.push(c),
            Component::ParentDir => {
                out.pop();
            }
            _ => {}
        }
    }
    out
}

/// Render a relative path with `/` separators on every platform.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(p) => p.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Translate one wildcard segment into an anchored regex over a file name.
fn segment_regex(segment: &str) -> Regex {
    let mut pattern = String::with_capacity(segment.len() + 8);
    pattern.push('^');
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                // A run of stars inside a segment collapses to one
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                pattern.push_str(".*");
            }
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).expect("segment pattern is always a valid regex")
}

/// Match a full path against a wildcard pattern.
///
/// Both sides use `/` as the separator. `**` crosses separators, `*` and
/// `?` do not.
pub fn match_path(path: &str, pattern: &str) -> bool {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    while chars.peek() == Some(&'*') {
                        chars.next();
                    }
                    re.push_str(".*");
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            _ => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    match Regex::new(&re) {
        Ok(rx) => rx.is_match(path),
        Err(_) => false,
    }
}

/// Split a pattern into segments on `/`, dropping empty and `.` parts.
fn pattern_segments(pattern: &str) -> Vec<String> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect()
}

/// Emit every regular file below `dir` in traversal order.
fn collect_tree(dir: &Path, files: &mut Vec<PathBuf>) {
    for entry in WalkDir::new(dir).into_iter().flatten() {
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
}

/// Recursive segment walk with duplicate suppression.
///
/// `visited` holds `(directory, segment index)` pairs already expanded;
/// `**` can reach the same directory along several routes and must not
/// emit its files twice.
fn walk_segments(
    files: &mut Vec<PathBuf>,
    current: &Path,
    segments: &[String],
    index: usize,
    visited: &mut HashSet<(PathBuf, usize)>,
) {
    if index >= segments.len() {
        if current.is_file() {
            files.push(current.to_path_buf());
        } else if current.is_dir() {
            collect_tree(current, files);
        }
        return;
    }

    let segment = &segments[index];

    if !current.is_dir() {
        return;
    }

    // Literal segment: descend without scanning the directory
    if !segment.contains('*') && !segment.contains('?') {
        walk_segments(files, &current.join(segment), segments, index + 1, visited);
        return;
    }

    if !visited.insert((current.to_path_buf(), index)) {
        return;
    }

    if segment == "**" {
        // Zero segments consumed
        walk_segments(files, current, segments, index + 1, visited);
        let entries = match std::fs::read_dir(current) {
            Ok(e) => e,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                // One or more segments consumed
                walk_segments(files, &entry.path(), segments, index, visited);
            }
        }
        return;
    }

    let rx = segment_regex(segment);
    let entries = match std::fs::read_dir(current) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if rx.is_match(name) {
            walk_segments(files, &entry.path(), segments, index + 1, visited);
        }
    }
}

/// Validate the base directory and re-root an absolute pattern against it.
///
/// Returns the directory to start walking from and the relative pattern
/// remainder. An absolute pattern whose leading segments differ from the
/// base is rejected.
fn rebase_pattern(base: &Path, pattern: &str) -> Result<(PathBuf, String)> {
    let pattern_path = Path::new(pattern);

    if base.as_os_str().is_empty() {
        if !pattern_path.is_absolute() {
            return Err(Error::MissingBasePath);
        }
        // Walk from the filesystem root
        let root: PathBuf = pattern_path
            .components()
            .take_while(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        return Ok((root, pattern.trim_start_matches('/').to_string()));
    }

    if !base.is_absolute() || !base.is_dir() {
        return Err(Error::invalid_path(base));
    }

    if pattern_path.is_absolute() {
        let rel = pattern_path
            .strip_prefix(base)
            .map_err(|_| Error::InvalidPath(pattern.to_string()))?;
        let rel = rel
            .to_str()
            .ok_or_else(|| Error::InvalidPath(pattern.to_string()))?;
        return Ok((base.to_path_buf(), rel.to_string()));
    }

    Ok((base.to_path_buf(), pattern.to_string()))
}

/// Expand a wildcard pattern below a base directory.
///
/// An empty pattern selects every file below the base. An empty match is
/// not an error; the returned list is simply empty.
pub fn resolve_wildcards(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if base.as_os_str().is_empty() && pattern.is_empty() {
        return Err(Error::MissingBasePath);
    }

    let (start, rel_pattern) = rebase_pattern(base, pattern)?;

    let mut files = Vec::new();
    if rel_pattern.is_empty() {
        collect_tree(&start, &mut files);
        return Ok(files);
    }

    let segments = pattern_segments(&rel_pattern);
    let mut visited = HashSet::new();
    walk_segments(&mut files, &start, &segments, 0, &mut visited);
    Ok(files)
}

/// Expand a regular expression below a base directory.
///
/// The expression is anchored over the path relative to the base, with `/`
/// as the separator on every platform.
pub fn resolve_regex(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if base.as_os_str().is_empty() {
        return Err(Error::MissingBasePath);
    }
    if !base.is_absolute() || !base.is_dir() {
        return Err(Error::invalid_path(base));
    }

    let rx = Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| Error::InvalidPath(format!("bad regex '{}': {}", pattern, e)))?;

    let mut files = Vec::new();
    for entry in WalkDir::new(base).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(base) else {
            continue;
        };
        let rel = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(p) => p.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        if rx.is_match(&rel) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
