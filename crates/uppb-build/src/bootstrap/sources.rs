//! Bootstrap package sources and object naming

use std::path::{Path, PathBuf};
use tracing::warn;
use uppb_config::descriptor::read_source_files;
use uppb_config::DESCRIPTOR_EXTENSION;

/// Packages compiled into the driver, in build order
pub const BOOTSTRAP_PACKAGES: &[&str] = &[
    "plugin/z",
    "plugin/pcre",
    "plugin/bz2",
    "plugin/lzma",
    "plugin/lz4",
    "plugin/zstd",
    "plugin/png",
    "Core",
    "Draw",
    "Esc",
    "ide/Core",
    "ide/Android",
    "ide/Java",
    "ide/Builders",
    "umk",
];

/// The package holding `main()`
pub const ENTRY_PACKAGE: &str = "umk";

/// Macro defined only for the entry package
pub const MAIN_MACRO: &str = "flagMAIN";

/// Source language of a translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// `.c` and `.brcc` compile as C, everything else as C++
    pub fn of(source: &str) -> Self {
        let lower = source.to_lowercase();
        if lower.ends_with(".c") || lower.ends_with(".brcc") {
            Self::C
        } else {
            Self::Cxx
        }
    }
}

/// One bootstrap package inside `uppsrc/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPackage {
    /// Package path relative to `uppsrc/` (`ide/Builders`)
    pub name: String,
    /// Package directory
    pub dir: PathBuf,
}

impl BootstrapPackage {
    pub fn new(uppsrc: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            dir: uppsrc.join(name),
        }
    }

    pub fn is_entry(&self) -> bool {
        self.name == ENTRY_PACKAGE
    }

    /// Descriptor path; nested packages fall back to their last component
    pub fn descriptor(&self) -> Option<PathBuf> {
        let dir_stem = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let last = self.name.rsplit('/').next().unwrap_or(&self.name);

        [dir_stem.as_str(), last]
            .iter()
            .map(|stem| self.dir.join(format!("{}.{}", stem, DESCRIPTOR_EXTENSION)))
            .find(|path| path.is_file())
    }

    /// Compilable sources in declaration order; empty when the package is absent
    pub fn sources(&self) -> Vec<String> {
        let Some(descriptor) = self.descriptor() else {
            return Vec::new();
        };
        match read_source_files(&descriptor) {
            Ok(sources) => sources,
            Err(error) => {
                warn!(package = %self.name, %error, "cannot read package descriptor");
                Vec::new()
            }
        }
    }

    /// Per-package object directory (`plugin/z` → `plugin_z`)
    pub fn out_dir(&self, out_root: &Path) -> PathBuf {
        out_root.join(self.name.replace(['/', '\\'], "_"))
    }
}

/// Flat object file name for a source path
pub fn object_name(source: &str, object_extension: &str) -> String {
    format!(
        "{}.{}",
        source.replace(['/', '\\', '.'], "_"),
        object_extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    #[rstest]
    #[case("Core.cpp", Language::Cxx)]
    #[case("zlib/adler32.c", Language::C)]
    #[case("Icons.brcc", Language::C)]
    #[case("Util.icpp", Language::Cxx)]
    fn test_language(#[case] source: &str, #[case] expected: Language) {
        assert_eq!(Language::of(source), expected);
    }

    #[test]
    fn test_object_name() {
        assert_eq!(object_name("lib/inflate.c", "o"), "lib_inflate_c.o");
        assert_eq!(object_name("Core.cpp", "obj"), "Core_cpp.obj");
    }

    #[test]
    fn test_out_dir() {
        let pkg = BootstrapPackage::new(Path::new("/r/uppsrc"), "ide/Builders");
        assert_eq!(pkg.out_dir(Path::new("/r/_out")), PathBuf::from("/r/_out/ide_Builders"));
        assert!(!pkg.is_entry());
        assert!(BootstrapPackage::new(Path::new("/r/uppsrc"), "umk").is_entry());
    }

    #[test]
    fn test_missing_package_has_no_sources() {
        let temp = TempDir::new().unwrap();
        let pkg = BootstrapPackage::new(temp.path(), "plugin/lz4");
        assert_eq!(pkg.descriptor(), None);
        assert!(pkg.sources().is_empty());
    }

    #[test]
    fn test_sources_from_descriptor() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("plugin/z");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("z.upp"),
            "file\n\tz.h,\n\tzlib/adler32.c,\n\tz.cpp;\n",
        )
        .unwrap();

        let pkg = BootstrapPackage::new(temp.path(), "plugin/z");
        assert_eq!(pkg.sources(), vec!["zlib/adler32.c", "z.cpp"]);
    }
}
