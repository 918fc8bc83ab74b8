//! uppb Configuration System
//!
//! Provides the text formats and configuration layers the build driver consumes:
//! - Package descriptors (`*.upp`): `mainconfig` presets and the `file` source list
//! - Package location by target name, directory or descriptor path
//! - Toolchain profiles (`*.bm`): `KEY = "value";` records
//! - Global user configuration (~/.config/uppb/config.toml)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config (~/.config/uppb/config.toml)
//! 3. Environment variables (UPPB_*, UPP_BM)
//! 4. CLI flags (handled by caller)
//!
//! # Example
//!
//! ```no_run
//! use uppb_config::{descriptor, PackageLocator};
//! use std::path::Path;
//!
//! let locator = PackageLocator::new(Path::new("/src/upp"));
//! let path = locator.resolve("umk").unwrap();
//! let configs = descriptor::read_mainconfigs(&path).unwrap();
//! ```

pub mod descriptor;
pub mod global;
pub mod loader;
pub mod locator;
pub mod method_file;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("No .upp file found in {0}")]
    NoPackage(PathBuf),

    #[error("Multiple .upp files in {dir}: {}", join_paths(.candidates))]
    AmbiguousPackage {
        dir: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("Missing .upp file: {0}")]
    MissingDescriptor(PathBuf),

    #[error("Unable to locate .upp file for {0}")]
    PackageNotFound(String),

    #[error("Multiple .upp files named {name}: {}", join_paths(.matches))]
    AmbiguousName { name: String, matches: Vec<PathBuf> },

    #[error("Home directory not found")]
    HomeNotFound,
}

impl ConfigError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Whether this error is a package resolution failure (not found or ambiguous)
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::NoPackage(_)
                | Self::AmbiguousPackage { .. }
                | Self::MissingDescriptor(_)
                | Self::PackageNotFound(_)
                | Self::AmbiguousName { .. }
        )
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Extension of package descriptor files
pub const DESCRIPTOR_EXTENSION: &str = "upp";

/// Extension of toolchain profile files
pub const METHOD_EXTENSION: &str = "bm";

// Re-export main types
pub use descriptor::MainConfigEntry;
pub use global::GlobalConfig;
pub use loader::{ConfigLoader, Settings};
pub use locator::PackageLocator;
pub use method_file::MethodFile;
