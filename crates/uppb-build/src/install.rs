//! Atomic replacement of output binaries
//!
//! A new binary is always produced under a temporary name first. Installing
//! it deletes the previous binary, or, when that binary is locked (a running
//! `umk.exe` replacing itself), renames it to a `.old` sibling. The
//! destination always holds a working binary, old or new.

use crate::error::{BuildError, BuildResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension given to a binary moved out of the way
pub const OLD_EXTENSION: &str = "old";

/// Filesystem operations used by the swapper
pub trait FileOps {
    fn exists(&self, path: &Path) -> bool;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// [`FileOps`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// How the previous binary was dealt with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No previous binary existed
    Fresh,
    /// The previous binary was deleted
    Replaced,
    /// The previous binary was locked and moved to this path
    MovedAside(PathBuf),
}

/// Installs temporary artifacts under their final name
#[derive(Debug, Clone, Default)]
pub struct ArtifactSwapper<F: FileOps = StdFileOps> {
    ops: F,
}

impl ArtifactSwapper<StdFileOps> {
    pub fn new() -> Self {
        Self { ops: StdFileOps }
    }
}

impl<F: FileOps> ArtifactSwapper<F> {
    pub fn with_ops(ops: F) -> Self {
        Self { ops }
    }

    /// Move `temp` to `dest`, displacing any existing binary
    pub fn install(&self, temp: &Path, dest: &Path) -> BuildResult<InstallOutcome> {
        let mut outcome = InstallOutcome::Fresh;

        if self.ops.exists(dest) {
            match self.ops.remove_file(dest) {
                Ok(()) => outcome = InstallOutcome::Replaced,
                Err(error) => {
                    debug!(path = %dest.display(), %error, "cannot delete previous binary");
                    let old = old_path(dest);
                    if self.ops.exists(&old) {
                        if let Err(error) = self.ops.remove_file(&old) {
                            debug!(path = %old.display(), %error, "stale .old binary left in place");
                        }
                    }
                    if let Err(error) = self.ops.rename(dest, &old) {
                        warn!(
                            "Could not replace {}. It may be in use. New binary left at {}",
                            dest.display(),
                            temp.display()
                        );
                        return Err(BuildError::install(
                            dest,
                            format!("it may be in use ({})", error),
                        ));
                    }
                    outcome = InstallOutcome::MovedAside(old);
                }
            }
        }

        self.ops.rename(temp, dest).map_err(|error| {
            BuildError::install(
                dest,
                format!("failed to move {}: {}", temp.display(), error),
            )
        })?;

        debug!(path = %dest.display(), ?outcome, "installed");
        Ok(outcome)
    }
}

/// `.old` sibling of a binary (`umk.exe` → `umk.old`)
pub fn old_path(dest: &Path) -> PathBuf {
    dest.with_extension(OLD_EXTENSION)
}

/// Remove a temporary artifact, ignoring a missing file
pub fn discard(temp: &Path) {
    if let Err(error) = fs::remove_file(temp) {
        if error.kind() != io::ErrorKind::NotFound {
            debug!(path = %temp.display(), %error, "could not remove temporary artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_old_path() {
        assert_eq!(old_path(Path::new("bin/umk.exe")), PathBuf::from("bin/umk.old"));
        assert_eq!(old_path(Path::new("bin/umk")), PathBuf::from("bin/umk.old"));
    }

    #[test]
    fn test_fresh_install() {
        let temp = TempDir::new().unwrap();
        let tmp = temp.path().join("umk_tmp_1");
        let dest = temp.path().join("umk");
        fs::write(&tmp, "new").unwrap();

        let outcome = ArtifactSwapper::new().install(&tmp, &dest).unwrap();
        assert_eq!(outcome, InstallOutcome::Fresh);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        assert!(!tmp.exists());
    }

    #[test]
    fn test_replace_existing() {
        let temp = TempDir::new().unwrap();
        let tmp = temp.path().join("umk_tmp_1");
        let dest = temp.path().join("umk");
        fs::write(&tmp, "new").unwrap();
        fs::write(&dest, "old").unwrap();

        let outcome = ArtifactSwapper::new().install(&tmp, &dest).unwrap();
        assert_eq!(outcome, InstallOutcome::Replaced);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_discard_missing_is_quiet() {
        let temp = TempDir::new().unwrap();
        discard(&temp.path().join("nothing"));
    }
}
