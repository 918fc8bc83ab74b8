//! Global Configuration (~/.config/uppb/config.toml)
//!
//! Handles user-level configuration. Every field is optional; anything left
//! unset falls back to the built-in defaults in [`crate::loader::Settings`].

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Normal build path settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,

    /// Toolchain profile discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub methods: Option<MethodsSection>,

    /// Bootstrap pipeline settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapSection>,
}

/// `[build]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Package roots handed to the build driver (joined with commas)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_roots: Option<Vec<String>>,

    /// Package roots searched when resolving a target by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_roots: Option<Vec<String>>,

    /// Output directory for executables, relative to the repository root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Extensions of sidecar files copied next to the executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar_extensions: Option<Vec<String>>,
}

/// `[methods]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct MethodsSection {
    /// Method token used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Directories holding user `.bm` profiles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_dirs: Option<Vec<PathBuf>>,
}

/// `[bootstrap]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BootstrapSection {
    /// External Makefile driving the POSIX bootstrap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub makefile: Option<PathBuf>,

    /// Intermediate output directory, relative to the repository root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::io(path, e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(build) = &self.build {
            if let Some(dir) = &build.output_dir {
                if dir.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "build.output_dir".to_string(),
                        reason: "output directory cannot be empty".to_string(),
                    });
                }
            }
            if let Some(exts) = &build.sidecar_extensions {
                if exts.iter().any(|ext| ext.trim_start_matches('.').is_empty()) {
                    return Err(ConfigError::InvalidValue {
                        field: "build.sidecar_extensions".to_string(),
                        reason: "extensions cannot be empty".to_string(),
                    });
                }
            }
        }

        if let Some(methods) = &self.methods {
            if methods.default.as_deref().is_some_and(|d| d.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: "methods.default".to_string(),
                    reason: "default method cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the global config file path (~/.config/uppb/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let base = dirs::config_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(base.join("uppb").join("config.toml"))
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.build.is_some() {
            self.build = other.build.clone();
        }
        if other.methods.is_some() {
            self.methods = other.methods.clone();
        }
        if other.bootstrap.is_some() {
            self.bootstrap = other.bootstrap.clone();
        }
    }
}
