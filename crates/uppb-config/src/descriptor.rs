//! Package Descriptor (`*.upp`)
//!
//! Scans the two descriptor blocks the driver cares about:
//!
//! - `mainconfig`: named flag presets, `"name" = "flags"` pairs in declaration order
//! - `file`: the ordered list of compilable sources, terminated by a line ending in `;`
//!
//! Both scanners are explicit two-state line machines (scanning vs. in-block) so the
//! block termination rules are independent of the pair extraction.

use crate::{ConfigError, ConfigResult};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Line that opens the mainconfig block
pub const MAINCONFIG_SENTINEL: &str = "mainconfig";

/// Line that opens the source file block
pub const FILE_SENTINEL: &str = "file";

/// Source extensions the bootstrap pipeline knows how to compile
pub const SOURCE_EXTENSIONS: &[&str] = &[".cpp", ".c", ".icpp", ".brcc"];

/// One named flag preset from a `mainconfig` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainConfigEntry {
    /// Preset name, e.g. `Debug (Posix)`
    pub name: String,
    /// Raw flag string as written in the descriptor
    pub flags: String,
}

impl MainConfigEntry {
    pub fn new(name: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: flags.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Scanning,
    InBlock,
}

fn pair_regex() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| Regex::new(r#""([^"]*)"\s*=\s*"([^"]*)""#).expect("valid regex"))
}

fn file_entry_regex() -> &'static Regex {
    static ENTRY: OnceLock<Regex> = OnceLock::new();
    ENTRY.get_or_init(|| Regex::new(r#"^"?([^",\s)]+)"?"#).expect("valid regex"))
}

/// Read a descriptor as text, replacing invalid UTF-8
pub fn read_descriptor(path: &Path) -> ConfigResult<String> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::io(path, e)
        }
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Extract the mainconfig block lines.
///
/// Blank lines before the first entry are skipped. The block ends at the first
/// blank line after content started, or at the first line that is not indented.
fn mainconfig_block(text: &str) -> Vec<&str> {
    let mut state = ScanState::Scanning;
    let mut block = Vec::new();

    for line in text.lines() {
        match state {
            ScanState::Scanning => {
                if line.trim() == MAINCONFIG_SENTINEL {
                    state = ScanState::InBlock;
                }
            }
            ScanState::InBlock => {
                if line.trim().is_empty() {
                    if block.is_empty() {
                        continue;
                    }
                    break;
                }
                if line.starts_with(char::is_whitespace) {
                    block.push(line);
                    continue;
                }
                break;
            }
        }
    }

    block
}

/// Parse the `mainconfig` block of a descriptor.
///
/// A descriptor without the sentinel yields an empty list.
pub fn parse_mainconfigs(text: &str) -> Vec<MainConfigEntry> {
    let block = mainconfig_block(text).join("\n");
    pair_regex()
        .captures_iter(&block)
        .map(|caps| MainConfigEntry::new(&caps[1], &caps[2]))
        .collect()
}

/// Read and parse the `mainconfig` block of the descriptor at `path`
pub fn read_mainconfigs(path: &Path) -> ConfigResult<Vec<MainConfigEntry>> {
    let text = read_descriptor(path)?;
    Ok(parse_mainconfigs(&text))
}

/// Whether a file name carries one of the compilable extensions
pub fn is_compilable(name: &str) -> bool {
    let lower = name.to_lowercase();
    SOURCE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Parse the ordered source list of the `file` block.
///
/// Entries may be quoted and may carry trailing options; only the leading
/// file name is kept. Separator pseudo-entries and non-compilable files are
/// dropped, and backslashes are normalised to `/`.
pub fn parse_source_files(text: &str) -> Vec<String> {
    let mut state = ScanState::Scanning;
    let mut sources = Vec::new();

    for raw in text.lines() {
        let mut line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line == FILE_SENTINEL {
            state = ScanState::InBlock;
            continue;
        }
        if state == ScanState::Scanning {
            continue;
        }

        if let Some(stripped) = line.strip_suffix(';') {
            state = ScanState::Scanning;
            line = stripped.trim();
        }
        if line.is_empty() || line.contains("readonly separator") {
            continue;
        }

        if let Some(caps) = file_entry_regex().captures(line) {
            let name = caps[1].replace('\\', "/");
            if is_compilable(&name) {
                sources.push(name);
            }
        }
    }

    sources
}

/// Read and parse the `file` block of the descriptor at `path`
pub fn read_source_files(path: &Path) -> ConfigResult<Vec<String>> {
    let text = read_descriptor(path)?;
    Ok(parse_source_files(&text))
}
