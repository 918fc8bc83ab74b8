//! Build methods (toolchain profiles)
//!
//! A build method is one `.bm` file plus the metadata needed to list, rank
//! and select it. Identity is the canonical path of the profile file.

use std::fmt;
use std::path::{Path, PathBuf};
use uppb_config::locator::package_name;
use uppb_config::method_file::read_builder;

/// A toolchain profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMethod {
    /// Selection name (`GCC`, `auto-clang`)
    pub name: String,
    /// Name shown in listings (`CLANG (auto)`)
    pub display: String,
    /// Profile file
    pub path: PathBuf,
    /// Written by this tool rather than the user
    pub generated: bool,
    /// Produced by compiler auto-detection
    pub auto: bool,
    /// Declared `BUILDER` identifier, if any
    pub builder: Option<String>,
}

impl BuildMethod {
    /// A user-provided profile; the builder is read from the file
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = package_name(&path);
        Self {
            display: name.clone(),
            builder: read_builder(&path),
            name,
            path,
            generated: false,
            auto: false,
        }
    }

    /// An auto-generated profile named after its file stem
    pub fn auto_generated(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = package_name(&path);
        Self {
            name: format!("auto-{}", stem.to_lowercase()),
            display: format!("{} (auto)", stem),
            path,
            generated: true,
            auto: true,
            builder: None,
        }
    }

    /// True iff the declared builder mentions Android
    pub fn is_android(&self) -> bool {
        self.builder
            .as_deref()
            .is_some_and(|b| b.to_lowercase().contains("android"))
    }

    /// Canonical profile path used for de-duplication
    pub fn identity(&self) -> PathBuf {
        canonical_or_self(&self.path)
    }

    /// Case-insensitive match against name or display name
    pub fn matches_name(&self, token: &str) -> bool {
        self.name.eq_ignore_ascii_case(token) || self.display.eq_ignore_ascii_case(token)
    }

    /// One line of `--list-methods` output
    pub fn list_line(&self, index: usize) -> String {
        let mut line = format!("[{}] {}: {}", index, self.display, self.path.display());
        if self.generated {
            line.push_str(" (generated)");
        }
        if let Some(builder) = &self.builder {
            line.push_str(&format!(" [builder: {}]", builder));
        }
        line
    }
}

impl fmt::Display for BuildMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        if let Some(builder) = &self.builder {
            write!(f, " [{}]", builder)?;
        }
        Ok(())
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
