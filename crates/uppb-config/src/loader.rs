//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::locator::DEFAULT_SEARCH_ROOTS;
use crate::ConfigResult;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Package roots handed to the build driver
pub const DEFAULT_DRIVER_ROOTS: &[&str] = &[
    "./upptst",
    "./rainbow",
    "./uppsrc",
    "./examples",
    "./tutorial",
    "./reference",
];

/// Directory marking a repository root
pub const REPO_MARKER_DIR: &str = "uppsrc";

/// Default executable output directory
pub const DEFAULT_OUTPUT_DIR: &str = "bin";

/// Default bootstrap intermediate directory
pub const DEFAULT_BOOTSTRAP_OUT_DIR: &str = "_out";

/// Default sidecar file extensions
pub const DEFAULT_SIDECAR_EXTENSIONS: &[&str] = &["eon"];

/// Environment variables naming a profile that replaces the default method
pub const METHOD_OVERRIDE_VARS: &[&str] = &["UPP_BM", "UPP_BUILD_MODEL"];

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Built-in defaults - lowest priority
/// 2. Global config (~/.config/uppb/config.toml) - overrides defaults
/// 3. Environment variables (UPPB_*, UPP_BM) - overrides global config
/// 4. CLI flags - highest priority (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Explicit global config path (tests, `--config`)
    global_config_path: Option<PathBuf>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Repository root (parent of `uppsrc/`)
    pub repo_root: PathBuf,
    /// Package roots handed to the build driver
    pub driver_roots: Vec<String>,
    /// Package roots searched by the locator
    pub package_roots: Vec<String>,
    /// Executable output directory, relative to the repository root
    pub output_dir: PathBuf,
    /// Sidecar file extensions copied next to the executable
    pub sidecar_extensions: Vec<String>,
    /// Method token preferred when none is given
    pub default_method: Option<String>,
    /// Profile file forced as the default method (UPP_BM)
    pub method_override: Option<PathBuf>,
    /// User profile directories; `None` means the platform defaults
    pub user_method_dirs: Option<Vec<PathBuf>>,
    /// External Makefile for the POSIX bootstrap
    pub bootstrap_makefile: Option<PathBuf>,
    /// Bootstrap intermediate directory, relative to the repository root
    pub bootstrap_out_dir: PathBuf,
}

impl Settings {
    /// Built-in defaults for a repository root
    pub fn defaults(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            driver_roots: DEFAULT_DRIVER_ROOTS.iter().map(|s| s.to_string()).collect(),
            package_roots: DEFAULT_SEARCH_ROOTS.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            sidecar_extensions: DEFAULT_SIDECAR_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_method: None,
            method_override: None,
            user_method_dirs: None,
            bootstrap_makefile: None,
            bootstrap_out_dir: PathBuf::from(DEFAULT_BOOTSTRAP_OUT_DIR),
        }
    }

    /// Absolute output directory
    pub fn output_path(&self) -> PathBuf {
        self.repo_root.join(&self.output_dir)
    }

    /// Absolute bootstrap intermediate directory
    pub fn bootstrap_out_path(&self) -> PathBuf {
        self.repo_root.join(&self.bootstrap_out_dir)
    }

    /// Apply a global config on top of these settings
    pub fn apply_global(&mut self, global: &GlobalConfig) {
        if let Some(build) = &global.build {
            if let Some(roots) = &build.driver_roots {
                self.driver_roots = roots.clone();
            }
            if let Some(roots) = &build.package_roots {
                self.package_roots = roots.clone();
            }
            if let Some(dir) = &build.output_dir {
                self.output_dir = dir.clone();
            }
            if let Some(exts) = &build.sidecar_extensions {
                self.sidecar_extensions = exts
                    .iter()
                    .map(|ext| ext.trim_start_matches('.').to_string())
                    .collect();
            }
        }
        if let Some(methods) = &global.methods {
            if let Some(default) = &methods.default {
                self.default_method = Some(default.clone());
            }
            if let Some(dirs) = &methods.user_dirs {
                self.user_method_dirs = Some(dirs.iter().map(|d| expand_home(d)).collect());
            }
        }
        if let Some(bootstrap) = &global.bootstrap {
            if let Some(makefile) = &bootstrap.makefile {
                self.bootstrap_makefile = Some(expand_home(makefile));
            }
            if let Some(dir) = &bootstrap.out_dir {
                self.bootstrap_out_dir = dir.clone();
            }
        }
    }
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use a specific global config file instead of the per-user one
    pub fn with_global_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Load settings for a run started in `cwd`
    ///
    /// `repo_root` is the CLI override; without it the root comes from
    /// `UPPB_REPO_ROOT` or from walking up to the first directory holding `uppsrc/`.
    pub fn load(&self, repo_root: Option<&Path>, cwd: &Path) -> ConfigResult<Settings> {
        let global = self.load_global_config()?;

        let repo_root = match repo_root {
            Some(root) => root.to_path_buf(),
            None => match env::var_os("UPPB_REPO_ROOT").filter(|v| !v.is_empty()) {
                Some(root) => PathBuf::from(root),
                None => find_repo_root(cwd).unwrap_or_else(|| cwd.to_path_buf()),
            },
        };
        let repo_root = if repo_root.is_absolute() {
            repo_root
        } else {
            cwd.join(repo_root)
        };

        let mut settings = Settings::defaults(repo_root);
        settings.apply_global(&global);
        self.apply_env_overrides(&mut settings);

        debug!(repo_root = %settings.repo_root.display(), "configuration loaded");
        Ok(settings)
    }

    /// Load the global config; a missing file is an empty config
    fn load_global_config(&self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match GlobalConfig::global_config_path() {
                Ok(path) => path,
                Err(_) => return Ok(GlobalConfig::default()),
            },
        };

        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, settings: &mut Settings) {
        if let Some(makefile) = env::var_os("UPPB_BOOTSTRAP_MAKEFILE").filter(|v| !v.is_empty()) {
            settings.bootstrap_makefile = Some(expand_home(Path::new(&makefile)));
        }

        for var in METHOD_OVERRIDE_VARS {
            if let Some(value) = env::var_os(var).filter(|v| !v.is_empty()) {
                settings.method_override = Some(expand_home(Path::new(&value)));
                break;
            }
        }
    }
}

/// Walk up from `start` to the first directory containing `uppsrc/`
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(REPO_MARKER_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_repo_root_walks_up() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("uppsrc/Core")).unwrap();
        let nested = temp.path().join("uppsrc/Core");

        assert_eq!(find_repo_root(&nested), Some(temp.path().to_path_buf()));
    }

    #[test]
    fn test_find_repo_root_none_without_marker() {
        let temp = TempDir::new().unwrap();
        assert_eq!(find_repo_root(temp.path()), None);
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::defaults("/r");
        assert_eq!(settings.output_path(), PathBuf::from("/r/bin"));
        assert_eq!(settings.bootstrap_out_path(), PathBuf::from("/r/_out"));
        assert_eq!(settings.driver_roots.join(","), "./upptst,./rainbow,./uppsrc,./examples,./tutorial,./reference");
    }

    #[test]
    #[serial]
    fn test_expand_home() {
        temp_env::with_var("HOME", Some("/home/tester"), || {
            assert_eq!(
                expand_home(Path::new("~/.config/u++")),
                PathBuf::from("/home/tester/.config/u++")
            );
            assert_eq!(expand_home(Path::new("/abs")), PathBuf::from("/abs"));
        });
    }

    #[test]
    #[serial]
    fn test_method_override_env() {
        let temp = TempDir::new().unwrap();
        temp_env::with_vars(
            [
                ("UPP_BM", Some("/tmp/Custom.bm")),
                ("UPP_BUILD_MODEL", Some("/tmp/Other.bm")),
                ("UPPB_REPO_ROOT", None),
                ("UPPB_BOOTSTRAP_MAKEFILE", None),
            ],
            || {
                let loader =
                    ConfigLoader::new().with_global_config_path(temp.path().join("none.toml"));
                let settings = loader.load(Some(temp.path()), temp.path()).unwrap();
                assert_eq!(settings.method_override, Some(PathBuf::from("/tmp/Custom.bm")));
            },
        );
    }
}
