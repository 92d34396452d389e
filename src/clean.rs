// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build artifact cleanup.
//!
//! Recursively walks a directory tree, and removes every directory whose name
//! matches one of the configured glob patterns, e.g., `bin` or `obj` for .NET
//! projects. Matched directories are removed whole, and never descended into.
//! Symbolic links are never followed.

use glob::Pattern;
use std::{
    fs::{read_dir, remove_dir_all},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Default directory patterns to remove.
pub const DEFAULT_PATTERNS: [&str; 2] = ["bin", "obj"];

/// Remove build artifact directories.
#[derive(Debug, Clone)]
pub struct Cleaner {
    patterns: Vec<Pattern>,
    dry_run: bool,
}

impl Cleaner {
    /// Construct new cleaner from glob patterns matched against directory names.
    ///
    /// # Errors
    ///
    /// - Return [`CleanError::Pattern`] if any pattern is not a valid glob.
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self> {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Pattern::new(pattern).map_err(|err| CleanError::Pattern {
                    source: err,
                    pattern: pattern.to_owned(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            dry_run: false,
        })
    }

    /// Only report what would be removed.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check if directory name is an artifact directory.
    pub fn is_artifact(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(name))
    }

    /// Remove all artifact directories beneath root.
    ///
    /// Directories are visited in sorted order. Failure to remove one
    /// directory does not stop the walk, it is reported in its [`Removal`]
    /// instead. Unreadable nested directories are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - Return [`CleanError::ReadDir`] if root cannot be read.
    #[instrument(skip(self, root), level = "debug")]
    pub fn clean(&self, root: impl AsRef<Path>) -> Result<Vec<Removal>> {
        let root = root.as_ref();
        let mut removals = Vec::new();
        let children = child_dirs(root).map_err(|err| CleanError::ReadDir {
            source: err,
            path: root.to_path_buf(),
        })?;

        for child in children {
            self.visit(child, &mut removals);
        }

        Ok(removals)
    }

    fn visit(&self, dir: PathBuf, removals: &mut Vec<Removal>) {
        let is_artifact = dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.is_artifact(name));

        if is_artifact {
            let result = if self.dry_run {
                info!("would remove {:?}", dir.display());
                Ok(())
            } else {
                let result = remove_dir_all(&dir);
                match &result {
                    Ok(_) => info!("removed {:?}", dir.display()),
                    Err(err) => warn!("failed to remove {:?}: {err}", dir.display()),
                }
                result
            };
            removals.push(Removal { path: dir, result });
            return;
        }

        match child_dirs(&dir) {
            Ok(children) => {
                for child in children {
                    self.visit(child, removals);
                }
            }
            Err(err) => warn!("skip unreadable directory {:?}: {err}", dir.display()),
        }
    }
}

/// Sorted list of real directories directly under a directory.
fn child_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in read_dir(dir)? {
        let entry = entry?;

        // INVARIANT: Symbolic links are never followed, even to directories.
        if entry.file_type()?.is_dir() {
            children.push(entry.path());
        } else {
            debug!("skip {:?}", entry.path().display());
        }
    }
    children.sort();

    Ok(children)
}

/// Outcome of removing a single artifact directory.
#[derive(Debug)]
pub struct Removal {
    /// Path to artifact directory.
    pub path: PathBuf,

    /// Result of removal. Always `Ok` for dry runs.
    pub result: io::Result<()>,
}

impl Removal {
    /// Check if the directory was (or would have been) removed.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Artifact cleanup error types.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// Glob pattern is invalid.
    #[error("invalid directory pattern {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Root directory cannot be read.
    #[error("failed to read directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CleanError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("bin", true; "exact bin")]
    #[test_case("obj", true; "exact obj")]
    #[test_case("Bin", false; "case sensitive")]
    #[test_case("binary", false; "longer name")]
    #[test_case("node_modules", true; "glob match")]
    #[test]
    fn match_artifact_names(name: &str, expect: bool) -> Result<()> {
        let cleaner = Cleaner::new(["bin", "obj", "node_*"])?;
        assert_eq!(cleaner.is_artifact(name), expect);

        Ok(())
    }

    #[test]
    fn reject_invalid_pattern() {
        let result = Cleaner::new(["[bin"]);
        assert!(matches!(result, Err(CleanError::Pattern { .. })));
    }
}
