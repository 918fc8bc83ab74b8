//! Build method discovery and ranking
//!
//! On POSIX hosts the registry synthesizes a profile for every known compiler
//! front-end found on the search path and merges those with the user's own
//! `.bm` files. Generated profiles live in `<temp>/upp_build_methods` and are
//! rewritten on every run from fresh probing; an edit made to one of them is
//! lost on the next run. Runs sharing that directory are not synchronized.
//!
//! Windows hosts only enumerate the user's profile directory.

use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::method::BuildMethod;
use crate::os::HostOs;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::OnceLock;
use tracing::debug;
use uppb_config::loader::expand_home;
use uppb_config::{MethodFile, Settings, METHOD_EXTENSION};

/// Directory (under the temp dir) holding generated profiles
pub const AUTO_METHOD_DIR: &str = "upp_build_methods";

/// Known compiler front-ends: profile stem and executable
pub const AUTO_COMPILERS: &[(&str, &str)] = &[("CLANG", "clang++"), ("GCC", "g++")];

/// Short aliases resolved against user profiles first, then `auto-<alias>`
pub const METHOD_ALIASES: &[&str] = &["clang", "gcc"];

/// POSIX default preference among auto-generated profiles
pub const POSIX_AUTO_PREFERENCE: &[&str] = &["auto-clang", "auto-gcc"];

/// Windows default preference, matched as profile stem prefixes
pub const WINDOWS_PRIORITY: &[&str] = &[
    "MSVS22x64",
    "MSVS22",
    "MSVS19x64",
    "MSVS19",
    "MSVS17x64",
    "MSVS17",
    "MSVS14x64",
    "MSVS14",
    "MSVS",
    "MSC",
];

const LLVM_PARENTS: &[&str] = &["usr/lib", "usr/lib64", "usr/local/lib", "usr/local/lib64"];

const INCLUDE_CANDIDATES: &[&str] = &[
    "usr/include/opencv4",
    "usr/include/gtk-4.0",
    "usr/include/glib-2.0",
    "usr/lib64/glib-2.0/include",
    "usr/lib/glib-2.0/include",
    "usr/include/cairo",
    "usr/local/include/opencv4",
    "usr/local/include/gtk-4.0",
    "usr/local/include/glib-2.0",
    "usr/local/lib/glib-2.0/include",
    "usr/local/lib64/glib-2.0/include",
    "usr/local/include/cairo",
];

const LIB_CANDIDATES: &[&str] = &["usr/lib64", "usr/lib", "usr/local/lib", "usr/local/lib64"];

/// Tool, include and library directories discovered on the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPaths {
    pub path: Vec<PathBuf>,
    pub include: Vec<PathBuf>,
    pub lib: Vec<PathBuf>,
}

impl BuildPaths {
    fn add(collection: &mut Vec<PathBuf>, entry: PathBuf) {
        if entry.exists() && !collection.contains(&entry) {
            collection.push(entry);
        }
    }
}

/// Discovers, generates and ranks build methods
#[derive(Debug, Clone)]
pub struct MethodRegistry {
    os: HostOs,
    user_dirs: Vec<PathBuf>,
    auto_dir: PathBuf,
    search_path: Option<String>,
    working_dir: PathBuf,
    probe_root: PathBuf,
    method_override: Option<PathBuf>,
    preferred: Option<String>,
}

impl MethodRegistry {
    /// Registry with the platform default directories
    pub fn new(ctx: &BuildContext) -> Self {
        Self {
            os: ctx.os(),
            user_dirs: default_user_dirs(ctx.os()),
            auto_dir: ctx.temp_dir().join(AUTO_METHOD_DIR),
            search_path: ctx.search_path().map(str::to_string),
            working_dir: ctx.working_dir().to_path_buf(),
            probe_root: PathBuf::from("/"),
            method_override: None,
            preferred: None,
        }
    }

    /// Registry honoring the user configuration and `UPP_BM`
    pub fn from_settings(ctx: &BuildContext, settings: &Settings) -> Self {
        let mut registry = Self::new(ctx);
        if let Some(dirs) = &settings.user_method_dirs {
            registry.user_dirs = dirs.clone();
        }
        registry.method_override = settings.method_override.clone();
        registry.preferred = settings.default_method.clone();
        registry
    }

    pub fn with_user_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.user_dirs = dirs;
        self
    }

    pub fn with_auto_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.auto_dir = dir.into();
        self
    }

    /// Filesystem root that system directories are probed under
    pub fn with_probe_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.probe_root = root.into();
        self
    }

    /// Profile file that replaces the default method
    pub fn with_method_override(mut self, path: Option<PathBuf>) -> Self {
        self.method_override = path;
        self
    }

    /// Method token preferred when none is given
    pub fn with_preferred(mut self, token: Option<String>) -> Self {
        self.preferred = token;
        self
    }

    pub fn auto_dir(&self) -> &Path {
        &self.auto_dir
    }

    pub fn os(&self) -> HostOs {
        self.os
    }

    /// All methods available on this host, auto-generated ones first
    pub fn collect(&self) -> BuildResult<Vec<BuildMethod>> {
        if self.os.is_windows() {
            let mut methods = Vec::new();
            for dir in &self.user_dirs {
                methods.extend(list_profiles(dir).into_iter().map(BuildMethod::from_file));
            }
            return Ok(methods);
        }

        self.ensure_auto_methods()?;

        let mut methods: Vec<BuildMethod> = list_profiles(&self.auto_dir)
            .into_iter()
            .map(BuildMethod::auto_generated)
            .collect();
        let mut seen: HashSet<PathBuf> = methods.iter().map(BuildMethod::identity).collect();

        for dir in &self.user_dirs {
            for path in list_profiles(dir) {
                let method = BuildMethod::from_file(path);
                if seen.insert(method.identity()) {
                    methods.push(method);
                }
            }
        }

        debug!(count = methods.len(), "collected build methods");
        Ok(methods)
    }

    /// Write a profile for every known compiler present on the search path
    pub fn ensure_auto_methods(&self) -> BuildResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.auto_dir).map_err(|e| BuildError::io(&self.auto_dir, e))?;

        let mut written = Vec::new();
        for (name, compiler) in AUTO_COMPILERS {
            if which::which_in(compiler, self.search_path.as_deref(), &self.working_dir).is_err() {
                continue;
            }
            let path = self
                .auto_dir
                .join(format!("{}.{}", name, METHOD_EXTENSION));
            self.auto_profile(name, compiler).save(&path)?;
            debug!(path = %path.display(), "generated build method");
            written.push(path);
        }
        Ok(written)
    }

    /// Profile body for an auto-detected compiler
    pub fn auto_profile(&self, name: &str, compiler: &str) -> MethodFile {
        let paths = self.detect_build_paths();
        MethodFile::new()
            .with("BUILDER", name)
            .with("COMPILER", compiler)
            .with("COMMON_OPTIONS", "-mpopcnt")
            .with("COMMON_CPP_OPTIONS", "-std=c++17 -Wno-logical-op-parentheses")
            .with("COMMON_C_OPTIONS", "")
            .with("COMMON_LINK", "")
            .with("COMMON_FLAGS", "")
            .with("DEBUG_INFO", "2")
            .with("DEBUG_BLITZ", "1")
            .with("DEBUG_LINKMODE", "1")
            .with("DEBUG_OPTIONS", "-O0")
            .with("DEBUG_FLAGS", "")
            .with("DEBUG_LINK", "")
            .with("DEBUG_CUDA", "")
            .with("RELEASE_BLITZ", "1")
            .with("RELEASE_LINKMODE", "1")
            .with("RELEASE_OPTIONS", "-O3 -ffunction-sections -fdata-sections")
            .with("RELEASE_FLAGS", "")
            .with("RELEASE_LINK", "-Wl,--gc-sections")
            .with("RELEASE_CUDA", "")
            .with("DEBUGGER", "gdb")
            .with("ALLOW_PRECOMPILED_HEADERS", "0")
            .with("DISABLE_BLITZ", "0")
            .with("PATH", join_paths(&paths.path))
            .with("INCLUDE", join_paths(&paths.include))
            .with("LIB", join_paths(&paths.lib))
            .with("LINKMODE_LOCK", "0")
    }

    /// Probe the known system locations and versioned LLVM installs
    pub fn detect_build_paths(&self) -> BuildPaths {
        let mut paths = BuildPaths::default();
        BuildPaths::add(&mut paths.path, self.probe_root.join("usr/bin"));

        for root in self.find_llvm_roots() {
            BuildPaths::add(&mut paths.path, root.join("bin"));
            BuildPaths::add(&mut paths.include, root.join("include"));
            BuildPaths::add(&mut paths.lib, root.join("lib"));
            BuildPaths::add(&mut paths.lib, root.join("lib64"));
        }
        for dir in INCLUDE_CANDIDATES {
            BuildPaths::add(&mut paths.include, self.probe_root.join(dir));
        }
        for dir in LIB_CANDIDATES {
            BuildPaths::add(&mut paths.lib, self.probe_root.join(dir));
        }
        if self.os.is_freebsd() {
            BuildPaths::add(&mut paths.path, self.probe_root.join("usr/local/bin"));
        }
        paths
    }

    /// `llvm*` directories, highest embedded version first
    pub fn find_llvm_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        for parent in LLVM_PARENTS {
            let Ok(entries) = fs::read_dir(self.probe_root.join(parent)) else {
                continue;
            };
            let mut found: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with("llvm"))
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            found.sort();
            roots.extend(found);
        }
        roots.sort_by_key(|root| std::cmp::Reverse(llvm_version(root)));
        roots
    }

    /// Method used when no token is given
    ///
    /// `UPP_BM` wins, then the configured default token, then the
    /// per-OS ranking.
    pub fn default_method(&self, methods: &[BuildMethod]) -> BuildResult<Option<BuildMethod>> {
        if let Some(path) = &self.method_override {
            return Ok(Some(BuildMethod::from_file(expand_home(path))));
        }
        if let Some(token) = &self.preferred {
            return self.resolve(methods, token).map(Some);
        }
        let method = if self.os.is_windows() {
            select_windows_default(methods)
        } else {
            select_posix_default(methods)
        };
        Ok(method.cloned())
    }

    /// Resolve an explicit method token
    pub fn resolve(&self, methods: &[BuildMethod], token: &str) -> BuildResult<BuildMethod> {
        let token = token.trim();

        if let Ok(index) = token.parse::<usize>() {
            return methods.get(index).cloned().ok_or_else(|| {
                BuildError::resolution(
                    format!("Build method index out of range: {}", index),
                    method_alternatives(methods),
                )
            });
        }

        let mut name = token.to_string();
        if is_path_like(token, self.os) {
            let path = expand_home(Path::new(token));
            if path.exists() {
                return Ok(BuildMethod::from_file(path));
            }
            name = uppb_config::locator::package_name(&path);
        }

        if let Some(method) = methods.iter().find(|m| m.matches_name(&name)) {
            return Ok(method.clone());
        }

        let lowered = name.to_lowercase();
        if METHOD_ALIASES.contains(&lowered.as_str()) {
            let auto_name = format!("auto-{}", lowered);
            let found = methods
                .iter()
                .find(|m| m.name.eq_ignore_ascii_case(&lowered))
                .or_else(|| methods.iter().find(|m| m.name.eq_ignore_ascii_case(&auto_name)));
            if let Some(method) = found {
                return Ok(method.clone());
            }
        }

        Err(BuildError::resolution(
            format!("Unknown build method: {}", name),
            method_alternatives(methods),
        ))
    }
}

/// Per-user profile directories
pub fn default_user_dirs(os: HostOs) -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    if os.is_windows() {
        vec![home.join("upp")]
    } else {
        let base = home.join(".config").join("u++");
        vec![base.join("theide"), base.join("umk")]
    }
}

/// First method whose builder is an Android builder
pub fn find_android(methods: &[BuildMethod]) -> Option<&BuildMethod> {
    methods.iter().find(|m| m.is_android())
}

/// POSIX ranking: user `clang`/`gcc`, then their auto variants, then the first
pub fn select_posix_default(methods: &[BuildMethod]) -> Option<&BuildMethod> {
    let user = METHOD_ALIASES.iter().find_map(|alias| {
        methods
            .iter()
            .find(|m| !m.auto && m.name.eq_ignore_ascii_case(alias))
    });
    user.or_else(|| {
        POSIX_AUTO_PREFERENCE
            .iter()
            .find_map(|name| methods.iter().find(|m| m.name.eq_ignore_ascii_case(name)))
    })
    .or_else(|| methods.first())
}

/// Windows ranking: IDE toolchain prefixes, then the smallest path
pub fn select_windows_default(methods: &[BuildMethod]) -> Option<&BuildMethod> {
    let stems: Vec<(String, &BuildMethod)> = methods
        .iter()
        .map(|m| (uppb_config::locator::package_name(&m.path).to_lowercase(), m))
        .collect();

    WINDOWS_PRIORITY
        .iter()
        .find_map(|prefix| {
            let prefix = prefix.to_lowercase();
            stems
                .iter()
                .find(|(stem, _)| stem.starts_with(&prefix))
                .map(|(_, m)| *m)
        })
        .or_else(|| methods.iter().min_by(|a, b| a.path.cmp(&b.path)))
}

/// `--list-methods` output
pub fn format_method_list(methods: &[BuildMethod]) -> String {
    if methods.is_empty() {
        return "No build methods found.".to_string();
    }
    methods
        .iter()
        .enumerate()
        .map(|(idx, m)| m.list_line(idx))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Version number embedded in an `llvm-NN` style directory name, 0 if none
pub fn llvm_version(path: &Path) -> u32 {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    let re = VERSION.get_or_init(|| Regex::new(r"llvm[-/]?(\d+)").expect("valid regex"));
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|name| re.captures(name))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

fn is_path_like(token: &str, os: HostOs) -> bool {
    let path = Path::new(token);
    path.extension().and_then(|e| e.to_str()) == Some(METHOD_EXTENSION)
        || path.is_absolute()
        || token.contains(MAIN_SEPARATOR)
        || (os.is_windows() && token.contains('/'))
}

fn list_profiles(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(METHOD_EXTENSION))
        .collect();
    paths.sort();
    paths
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(";")
}

fn method_alternatives(methods: &[BuildMethod]) -> Vec<String> {
    methods
        .iter()
        .enumerate()
        .map(|(idx, m)| format!("[{}] {}", idx, m.display))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn user(path: &str) -> BuildMethod {
        BuildMethod::from_file(path)
    }

    #[test]
    fn test_llvm_version() {
        assert_eq!(llvm_version(Path::new("/usr/lib/llvm-17")), 17);
        assert_eq!(llvm_version(Path::new("/usr/lib/llvm18")), 18);
        assert_eq!(llvm_version(Path::new("/usr/lib/llvm")), 0);
    }

    #[test]
    fn test_llvm_roots_highest_version_first() {
        let temp = TempDir::new().unwrap();
        for dir in ["usr/lib/llvm-14", "usr/lib/llvm-17", "usr/local/lib/llvm19", "usr/lib/llvm"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        let registry = MethodRegistry::new(&BuildContext::new(temp.path())).with_probe_root(temp.path());

        let names: Vec<String> = registry
            .find_llvm_roots()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["llvm19", "llvm-17", "llvm-14", "llvm"]);
    }

    #[test]
    fn test_detect_build_paths_only_existing() {
        let temp = TempDir::new().unwrap();
        for dir in ["usr/bin", "usr/lib/llvm-17/bin", "usr/lib/llvm-17/include", "usr/include/cairo"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        let ctx = BuildContext::new(temp.path()).with_os(HostOs::Linux);
        let paths = MethodRegistry::new(&ctx).with_probe_root(temp.path()).detect_build_paths();

        assert_eq!(
            paths.path,
            vec![temp.path().join("usr/bin"), temp.path().join("usr/lib/llvm-17/bin")]
        );
        assert_eq!(
            paths.include,
            vec![
                temp.path().join("usr/lib/llvm-17/include"),
                temp.path().join("usr/include/cairo")
            ]
        );
        assert_eq!(paths.lib, vec![temp.path().join("usr/lib")]);
    }

    #[test]
    fn test_posix_default_prefers_user_profiles() {
        let methods = vec![
            BuildMethod::auto_generated("/t/CLANG.bm"),
            BuildMethod::auto_generated("/t/GCC.bm"),
            user("/h/umk/GCC.bm"),
        ];
        assert_eq!(select_posix_default(&methods).unwrap().path, PathBuf::from("/h/umk/GCC.bm"));
    }

    #[test]
    fn test_posix_default_auto_then_first() {
        let methods = vec![user("/h/umk/ARM.bm"), BuildMethod::auto_generated("/t/GCC.bm")];
        assert_eq!(select_posix_default(&methods).unwrap().name, "auto-gcc");

        let methods = vec![user("/h/umk/ARM.bm"), user("/h/umk/MINGW.bm")];
        assert_eq!(select_posix_default(&methods).unwrap().name, "ARM");
        assert!(select_posix_default(&[]).is_none());
    }

    #[test]
    fn test_windows_default_priority() {
        let methods = vec![
            user("C:/u/upp/CLANG.bm"),
            user("C:/u/upp/MSVS19.bm"),
            user("C:/u/upp/msvs22x64.bm"),
        ];
        assert_eq!(select_windows_default(&methods).unwrap().name, "msvs22x64");

        let methods = vec![user("C:/u/upp/ZIG.bm"), user("C:/u/upp/CLANG.bm")];
        assert_eq!(select_windows_default(&methods).unwrap().name, "CLANG");
    }

    #[test]
    fn test_resolve_by_index_and_name() {
        let ctx = BuildContext::new("/r").with_os(HostOs::Linux);
        let registry = MethodRegistry::new(&ctx);
        let methods = vec![BuildMethod::auto_generated("/t/CLANG.bm"), user("/h/umk/GCC.bm")];

        assert_eq!(registry.resolve(&methods, "1").unwrap().name, "GCC");
        assert_eq!(registry.resolve(&methods, "clang (AUTO)").unwrap().name, "auto-clang");
        assert_eq!(registry.resolve(&methods, "clang").unwrap().name, "auto-clang");
    }

    #[test]
    fn test_resolve_unknown_lists_methods() {
        let ctx = BuildContext::new("/r").with_os(HostOs::Linux);
        let registry = MethodRegistry::new(&ctx);
        let methods = vec![user("/h/umk/GCC.bm")];

        let err = registry.resolve(&methods, "MSC").unwrap_err();
        assert_eq!(err.to_string(), "Unknown build method: MSC. Available: [0] GCC");

        let err = registry.resolve(&methods, "4").unwrap_err();
        assert!(err.to_string().starts_with("Build method index out of range: 4"));
    }

    #[test]
    fn test_resolve_missing_path_falls_back_to_stem() {
        let ctx = BuildContext::new("/r").with_os(HostOs::Linux);
        let registry = MethodRegistry::new(&ctx);
        let methods = vec![user("/h/umk/GCC.bm")];

        let method = registry.resolve(&methods, "/nowhere/GCC.bm").unwrap();
        assert_eq!(method.path, PathBuf::from("/h/umk/GCC.bm"));
    }

    #[test]
    fn test_find_android() {
        let mut android = user("/h/umk/NDK.bm");
        android.builder = Some("ANDROID".to_string());
        let methods = vec![user("/h/umk/GCC.bm"), android];
        assert_eq!(find_android(&methods).unwrap().name, "NDK");
        assert!(find_android(&methods[..1]).is_none());
    }

    #[test]
    fn test_format_empty_list() {
        assert_eq!(format_method_list(&[]), "No build methods found.");
    }
}
