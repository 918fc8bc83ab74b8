//! Immutable per-run build context
//!
//! Every child process started by this crate takes its working directory and
//! environment from a [`BuildContext`]. Toolchains that need a different
//! environment (MSVC after `vcvarsall.bat`) derive a new context instead of
//! mutating the process environment.

use crate::os::HostOs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    repo_root: PathBuf,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    os: HostOs,
}

impl BuildContext {
    /// Context with an empty environment
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            working_dir: None,
            env: BTreeMap::new(),
            os: HostOs::current(),
        }
    }

    /// Context capturing the current process environment
    pub fn from_process_env(repo_root: impl Into<PathBuf>) -> Self {
        Self::new(repo_root).with_env(std::env::vars().collect())
    }

    /// Run child processes in `dir` instead of the repository root
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Replace the environment snapshot
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Override the host OS (tests)
    pub fn with_os(mut self, os: HostOs) -> Self {
        self.os = os;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Directory child processes start in
    pub fn working_dir(&self) -> &Path {
        self.working_dir.as_deref().unwrap_or(&self.repo_root)
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn os(&self) -> HostOs {
        self.os
    }

    /// Look up a variable; Windows names are matched case-insensitively
    pub fn env_var(&self, key: &str) -> Option<&str> {
        if let Some(value) = self.env.get(key) {
            return Some(value.as_str());
        }
        if self.os.is_windows() {
            return self
                .env
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str());
        }
        None
    }

    /// Executable search path
    pub fn search_path(&self) -> Option<&str> {
        self.env_var("PATH")
    }

    /// Per-user temporary directory
    pub fn temp_dir(&self) -> PathBuf {
        let keys: &[&str] = if self.os.is_windows() {
            &["TEMP", "TMP"]
        } else {
            &["TMPDIR"]
        };
        keys.iter()
            .filter_map(|key| self.env_var(key))
            .find(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Resolve an executable against the context's search path
    pub fn which(&self, program: &str) -> Option<PathBuf> {
        which::which_in(program, self.search_path(), self.working_dir()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_working_dir_defaults_to_repo_root() {
        let ctx = BuildContext::new("/src/upp");
        assert_eq!(ctx.working_dir(), Path::new("/src/upp"));

        let ctx = ctx.with_working_dir("/src/upp/uppsrc");
        assert_eq!(ctx.working_dir(), Path::new("/src/upp/uppsrc"));
    }

    #[test]
    fn test_windows_env_lookup_ignores_case() {
        let ctx = BuildContext::new("C:/upp")
            .with_os(HostOs::Windows)
            .with_env(env(&[("Path", "C:/bin")]));
        assert_eq!(ctx.search_path(), Some("C:/bin"));

        let posix = BuildContext::new("/upp")
            .with_os(HostOs::Linux)
            .with_env(env(&[("Path", "/bin")]));
        assert_eq!(posix.search_path(), None);
    }

    #[test]
    fn test_temp_dir_from_snapshot() {
        let ctx = BuildContext::new("/upp")
            .with_os(HostOs::Linux)
            .with_env(env(&[("TMPDIR", "/scratch")]));
        assert_eq!(ctx.temp_dir(), PathBuf::from("/scratch"));
    }

    #[test]
    fn test_which_uses_snapshot_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let ctx = BuildContext::new(temp.path())
            .with_os(HostOs::Linux)
            .with_env(env(&[("PATH", temp.path().to_str().unwrap())]));
        assert_eq!(ctx.which("definitely-not-a-compiler"), None);
    }
}
