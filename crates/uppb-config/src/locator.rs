//! Package Locator
//!
//! Resolves a target given on the command line to exactly one package
//! descriptor file. Targets may be a directory holding a single descriptor,
//! a descriptor path, or a bare package name searched for under the
//! repository's package roots.

use crate::{ConfigError, ConfigResult, DESCRIPTOR_EXTENSION};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Package roots searched (in order) before falling back to a full scan
pub const DEFAULT_SEARCH_ROOTS: &[&str] = &[
    "upptst",
    "uppsrc",
    "examples",
    "tutorial",
    "reference",
    "stdsrc",
    "stdtst",
];

/// Directories never descended into during the fallback scan
pub const SKIPPED_DIRS: &[&str] = &[".git", ".svn", ".hg", "bin", "_out"];

/// Finds package descriptors inside a repository
#[derive(Debug, Clone)]
pub struct PackageLocator {
    repo_root: PathBuf,
    search_roots: Vec<PathBuf>,
}

impl PackageLocator {
    /// Create a locator with the default package roots
    pub fn new(repo_root: &Path) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            search_roots: DEFAULT_SEARCH_ROOTS
                .iter()
                .map(|root| repo_root.join(root))
                .collect(),
        }
    }

    /// Replace the prioritized package roots (relative entries are joined to the repo root)
    pub fn with_search_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.search_roots = roots
            .into_iter()
            .map(|root| self.repo_root.join(root))
            .collect();
        self
    }

    /// Repository root this locator searches
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Resolve a target to its descriptor path
    pub fn resolve(&self, target: &str) -> ConfigResult<PathBuf> {
        let target_path = Path::new(target);
        let candidate = if target_path.is_absolute() {
            target_path.to_path_buf()
        } else {
            self.repo_root.join(target_path)
        };

        if candidate.is_dir() {
            return self.resolve_directory(&candidate);
        }

        if has_descriptor_extension(target_path) {
            if !candidate.is_file() {
                return Err(ConfigError::MissingDescriptor(candidate));
            }
            return canonical(&candidate);
        }

        self.find_by_name(&format!("{}.{}", target, DESCRIPTOR_EXTENSION))
    }

    /// A directory must contain exactly one descriptor
    fn resolve_directory(&self, dir: &Path) -> ConfigResult<PathBuf> {
        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::io(dir, e))?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_descriptor_extension(path))
            .collect();
        candidates.sort();

        match candidates.len() {
            0 => Err(ConfigError::NoPackage(dir.to_path_buf())),
            1 => canonical(&candidates[0]),
            _ => Err(ConfigError::AmbiguousPackage {
                dir: dir.to_path_buf(),
                candidates,
            }),
        }
    }

    /// Search the package roots, then the whole repository
    fn find_by_name(&self, filename: &str) -> ConfigResult<PathBuf> {
        let mut matches = Vec::new();

        for root in &self.search_roots {
            if !root.exists() {
                continue;
            }
            matches.extend(
                WalkDir::new(root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && e.file_name() == filename)
                    .map(|e| e.into_path()),
            );
        }

        if matches.is_empty() {
            debug!(filename, "not found under package roots, scanning repository");
            matches.extend(
                WalkDir::new(&self.repo_root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|e| !is_skipped_dir(e))
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && e.file_name() == filename)
                    .map(|e| e.into_path()),
            );
        }

        match matches.len() {
            0 => Err(ConfigError::PackageNotFound(filename.to_string())),
            1 => canonical(&matches[0]),
            _ => Err(ConfigError::AmbiguousName {
                name: filename.to_string(),
                matches,
            }),
        }
    }
}

/// Package name of a descriptor path (its file stem)
pub fn package_name(descriptor: &Path) -> String {
    descriptor
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_descriptor_extension(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn canonical(path: &Path) -> ConfigResult<PathBuf> {
    path.canonicalize().map_err(|e| ConfigError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_package_name_is_stem() {
        assert_eq!(package_name(Path::new("/r/uppsrc/umk/umk.upp")), "umk");
    }

    #[test]
    fn test_skipped_dirs_are_not_scanned() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("bin/Hidden/Hidden.upp"));
        touch(&temp.path().join(".git/Hidden.upp"));

        let locator = PackageLocator::new(temp.path());
        let err = locator.resolve("Hidden").unwrap_err();
        assert!(matches!(err, ConfigError::PackageNotFound(_)));
    }

    #[test]
    fn test_custom_search_roots() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("mine/App/App.upp"));
        touch(&temp.path().join("uppsrc/App/App.upp"));

        let locator = PackageLocator::new(temp.path()).with_search_roots(["mine"]);
        let path = locator.resolve("App").unwrap();
        assert!(path.ends_with("mine/App/App.upp"));
    }
}
