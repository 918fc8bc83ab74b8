//! Makefile-driven POSIX bootstrap
//!
//! Delegates compilation to an external Makefile run inside `uppsrc/`. The
//! Makefile's own `OutFile`, `CINC` and `Macro` variables are read so the
//! produced binary can be found and FreeBSD hosts can be patched up.

use crate::error::{BuildError, BuildResult};
use crate::os::HostOs;
use crate::process::ToolCommand;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Binary name used when the Makefile sets no `OutFile`
pub const DEFAULT_OUT_FILE: &str = "umk.out";

/// Object directory handed to the Makefile, relative to `uppsrc/`
pub const MAKE_OUT_DIR: &str = "../out/";

const FREEBSD_INCLUDE: &str = "-I/usr/local/include";

fn assignment_regex() -> &'static Regex {
    static ASSIGNMENT: OnceLock<Regex> = OnceLock::new();
    ASSIGNMENT.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)\s*=\s*(.*)$").expect("valid regex"))
}

/// Top-level `KEY = value` assignments; recipe lines and comments are ignored
pub fn parse_makefile_vars(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter(|line| !line.is_empty() && !line.starts_with('\t') && !line.starts_with('#'))
        .filter_map(|line| assignment_regex().captures(line))
        .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
        .collect()
}

/// A parsed bootstrap Makefile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMakefile {
    path: PathBuf,
    vars: BTreeMap<String, String>,
}

impl BootstrapMakefile {
    pub fn load(path: &Path) -> BuildResult<Self> {
        if !path.is_file() {
            return Err(BuildError::toolchain(format!(
                "Missing bootstrap Makefile: {}",
                path.display()
            )));
        }
        let bytes = fs::read(path).map_err(|e| BuildError::io(path, e))?;
        Ok(Self::from_text(path, &String::from_utf8_lossy(&bytes)))
    }

    pub fn from_text(path: &Path, text: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            vars: parse_makefile_vars(text),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Name of the binary the Makefile produces inside `uppsrc/`
    pub fn out_file(&self) -> String {
        self.var("OutFile")
            .map(|v| v.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_OUT_FILE.to_string())
    }

    fn base_command(&self, uppsrc: &Path) -> ToolCommand {
        ToolCommand::new("make")
            .arg("-f")
            .arg(&self.path)
            .arg("-C")
            .arg(uppsrc)
    }

    pub fn clean_command(&self, uppsrc: &Path) -> ToolCommand {
        self.base_command(uppsrc).arg("clean")
    }

    pub fn build_command(&self, uppsrc: &Path, os: HostOs, jobs: Option<u32>) -> ToolCommand {
        let mut command = self
            .base_command(uppsrc)
            .arg(format!("UPPOUT={}", MAKE_OUT_DIR));

        if os.is_freebsd() {
            if let Some(cinc) = self.var("CINC").filter(|v| !v.is_empty()) {
                command = command.arg(format!("CINC={} {}", cinc, FREEBSD_INCLUDE));
            }
            if let Some(macro_defs) = self.var("Macro").filter(|v| !v.is_empty()) {
                command = command.arg(format!("Macro={}", freebsd_macros(macro_defs)));
            }
        }

        if let Some(jobs) = jobs {
            command = command.arg(format!("-j{}", jobs));
        }
        command
    }
}

/// Retarget a Linux macro set at FreeBSD
fn freebsd_macros(macro_defs: &str) -> String {
    let mut macros = macro_defs.replace("-DflagLINUX", "-DflagFREEBSD");
    for required in ["-DflagFREEBSD", "-DflagPOSIX"] {
        if !macros.contains(required) {
            macros.push(' ');
            macros.push_str(required);
        }
    }
    macros
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAKEFILE: &str = "\
# generated by umk
UPPDIR1 = ./
CINC   =  -I$(UPPDIR1) -I/usr/include/freetype2
Macro  = -DflagGCC -DflagLINUX -DflagMAIN
OutFile = \"umk.out\"

all: prepare $(OutFile)
\tmkdir -p $(UPPOUT)
";

    fn args(command: &ToolCommand) -> Vec<String> {
        command
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_parse_vars() {
        let vars = parse_makefile_vars(MAKEFILE);
        assert_eq!(vars.get("UPPDIR1").map(String::as_str), Some("./"));
        assert_eq!(
            vars.get("Macro").map(String::as_str),
            Some("-DflagGCC -DflagLINUX -DflagMAIN")
        );
        assert!(!vars.contains_key("all"));
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_out_file() {
        let mk = BootstrapMakefile::from_text(Path::new("/mk/Makefile"), MAKEFILE);
        assert_eq!(mk.out_file(), "umk.out");

        let bare = BootstrapMakefile::from_text(Path::new("/mk/Makefile"), "CC = c++\n");
        assert_eq!(bare.out_file(), DEFAULT_OUT_FILE);
    }

    #[test]
    fn test_linux_commands() {
        let mk = BootstrapMakefile::from_text(Path::new("/mk/Makefile"), MAKEFILE);
        let uppsrc = Path::new("/upp/uppsrc");

        assert_eq!(
            mk.clean_command(uppsrc).display_line(),
            "make -f /mk/Makefile -C /upp/uppsrc clean"
        );
        assert_eq!(
            mk.build_command(uppsrc, HostOs::Linux, Some(8)).display_line(),
            "make -f /mk/Makefile -C /upp/uppsrc UPPOUT=../out/ -j8"
        );
        assert_eq!(args(&mk.build_command(uppsrc, HostOs::Linux, None)).len(), 5);
    }

    #[test]
    fn test_freebsd_adjustments() {
        let mk = BootstrapMakefile::from_text(Path::new("/mk/Makefile"), MAKEFILE);
        let args = args(&mk.build_command(Path::new("/upp/uppsrc"), HostOs::FreeBsd, None));

        assert_eq!(
            args[5],
            "CINC=-I$(UPPDIR1) -I/usr/include/freetype2 -I/usr/local/include"
        );
        assert_eq!(args[6], "Macro=-DflagGCC -DflagFREEBSD -DflagMAIN -DflagPOSIX");
    }

    #[test]
    fn test_missing_makefile() {
        let err = BootstrapMakefile::load(Path::new("/definitely/not/Makefile")).unwrap_err();
        assert!(err.to_string().contains("Missing bootstrap Makefile"));
        assert_eq!(err.exit_code(), 2);
    }
}
