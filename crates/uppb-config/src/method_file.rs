//! Toolchain profile files (`*.bm`)
//!
//! A profile is a flat list of `KEY = "value";` lines. Key order is kept so a
//! generated profile renders byte-for-byte the same on every run.

use crate::{ConfigError, ConfigResult};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Key naming the builder backend (GCC, CLANG, MSC22, ANDROID, ...)
pub const BUILDER_KEY: &str = "BUILDER";

fn line_regex() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r#"^\s*([A-Za-z0-9_]+)\s*=\s*"((?:[^"\\]|\\.)*)"\s*;"#).expect("valid regex")
    })
}

/// Parsed toolchain profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodFile {
    entries: Vec<(String, String)>,
}

impl MethodFile {
    /// Create an empty profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse profile text; lines that are not `KEY = "value";` are ignored
    pub fn parse(text: &str) -> Self {
        let mut file = Self::new();
        for line in text.lines() {
            if let Some(caps) = line_regex().captures(line) {
                file.set(&caps[1], &caps[2]);
            }
        }
        file
    }

    /// Load a profile from disk
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::io(path, e)
            }
        })?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Write the rendered profile, replacing any existing file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        std::fs::write(path, self.to_string()).map_err(|e| ConfigError::io(path, e))
    }

    /// Builder with a value; later writes of an existing key replace it in place
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a key, keeping its original position if already present
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Declared builder identifier, if any
    pub fn builder(&self) -> Option<&str> {
        self.get(BUILDER_KEY)
            .map(str::trim)
            .filter(|builder| !builder.is_empty())
    }

    /// All entries in declaration order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for MethodFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{} = \"{}\";", key, value)?;
        }
        Ok(())
    }
}

/// Read just the builder identifier of a profile; unreadable files have none
pub fn read_builder(path: &Path) -> Option<String> {
    MethodFile::load(path)
        .ok()
        .and_then(|file| file.builder().map(str::to_string))
}
