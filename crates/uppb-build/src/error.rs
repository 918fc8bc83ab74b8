/// Build system error types
use std::path::PathBuf;
use thiserror::Error;
use uppb_config::ConfigError;

pub type BuildResult<T> = Result<T, BuildError>;

/// Exit code for usage, resolution and toolchain failures
pub const EXIT_USAGE: i32 = 2;

/// Exit code when the output binary could not be replaced
pub const EXIT_INSTALL: i32 = 1;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{0}")]
    Usage(String),

    #[error("{message}{}", format_alternatives(.alternatives))]
    Resolution {
        message: String,
        alternatives: Vec<String>,
    },

    #[error("{0}")]
    Toolchain(String),

    #[error("Failed to start {program}: {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },

    #[error("Compilation failed for {}", .file.display())]
    Compilation { file: PathBuf, exit_code: i32 },

    #[error("Linking failed for {}", .output.display())]
    Link { output: PathBuf, exit_code: i32 },

    #[error("Build driver exited with code {exit_code}")]
    Driver { exit_code: i32 },

    #[error("Could not replace {}: {reason}", .path.display())]
    Install { path: PathBuf, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },
}

impl BuildError {
    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Create a resolution error listing the valid alternatives
    pub fn resolution(message: impl Into<String>, alternatives: Vec<String>) -> Self {
        Self::Resolution {
            message: message.into(),
            alternatives,
        }
    }

    /// Create a toolchain error
    pub fn toolchain(message: impl Into<String>) -> Self {
        Self::Toolchain(message.into())
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create an install error
    pub fn install(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Install {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_)
            | Self::Resolution { .. }
            | Self::Toolchain(_)
            | Self::Spawn { .. }
            | Self::Config(_) => EXIT_USAGE,
            Self::Compilation { exit_code, .. }
            | Self::Link { exit_code, .. }
            | Self::Driver { exit_code } => *exit_code,
            Self::Install { .. } | Self::IoError { .. } => EXIT_INSTALL,
        }
    }
}

fn format_alternatives(alternatives: &[String]) -> String {
    if alternatives.is_empty() {
        String::new()
    } else {
        format!(". Available: {}", alternatives.join(", "))
    }
}
