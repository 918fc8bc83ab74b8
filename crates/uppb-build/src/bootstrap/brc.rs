//! Embedded binary resources (`*.brc`)
//!
//! Each `BINARY(sym, "file")` line becomes a byte array plus exported
//! `sym_length` and `sym` accessors in a generated C++ translation unit.

use super::incremental::needs_rebuild;
use crate::error::{BuildError, BuildResult};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Extension of resource descriptor files
pub const BRC_EXTENSION: &str = "brc";

/// One `BINARY(...)` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryResource {
    pub symbol: String,
    pub file: String,
}

fn binary_regex() -> &'static Regex {
    static BINARY: OnceLock<Regex> = OnceLock::new();
    BINARY.get_or_init(|| {
        Regex::new(r#"^BINARY\s*\(\s*([^,]+)\s*,\s*"([^"]+)"\s*\)"#).expect("valid regex")
    })
}

/// Parse the `BINARY` declarations of a resource descriptor
pub fn parse_brc(text: &str) -> Vec<BinaryResource> {
    text.lines()
        .filter_map(|line| binary_regex().captures(line))
        .map(|caps| BinaryResource {
            symbol: caps[1].trim().to_string(),
            file: caps[2].trim().to_string(),
        })
        .collect()
}

/// Render the translation unit for one resource's bytes
pub fn render_resource(symbol: &str, data: &[u8]) -> String {
    let bytes = data
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "static const unsigned char {sym}_[] = {{\n{bytes}\n}};\n\
         extern \"C\" const int {sym}_length = {len};\n\
         extern \"C\" const unsigned char *{sym} = {sym}_;",
        sym = symbol,
        bytes = bytes,
        len = data.len()
    )
}

/// Render every resource whose file exists under `package_dir`
pub fn render_brc(resources: &[BinaryResource], package_dir: &Path) -> BuildResult<String> {
    let mut parts = Vec::new();
    for resource in resources {
        let path = package_dir.join(&resource.file);
        if !path.is_file() {
            warn!(file = %path.display(), "embedded resource missing, skipped");
            continue;
        }
        let data = fs::read(&path).map_err(|e| BuildError::io(&path, e))?;
        parts.push(render_resource(&resource.symbol, &data));
    }
    Ok(parts.join("\n"))
}

/// `*.brc` files directly inside a package directory
pub fn find_brc_files(package_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(package_dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(BRC_EXTENSION))
        .collect();
    files.sort();
    files
}

/// Regenerate `<out_dir>/<name>.brc.cpp` when the `.brc` is newer
pub fn generate(brc: &Path, out_dir: &Path) -> BuildResult<PathBuf> {
    let file_name = brc
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let generated = out_dir.join(format!("{}.cpp", file_name));

    if needs_rebuild(brc, &generated) {
        debug!("Converting {} to {}", brc.display(), generated.display());
        let bytes = fs::read(brc).map_err(|e| BuildError::io(brc, e))?;
        let text = String::from_utf8_lossy(&bytes);
        let package_dir = brc.parent().unwrap_or(Path::new("."));
        let body = render_brc(&parse_brc(&text), package_dir)?;
        fs::write(&generated, body).map_err(|e| BuildError::io(&generated, e))?;
    }
    Ok(generated)
}
