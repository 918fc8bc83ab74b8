//! Host compiler toolchains for the bootstrap pipeline
//!
//! - [`MsvcToolchain`]: `cl.exe`/`link.exe`, located through `vswhere.exe`
//!   and `vcvarsall.bat` when not already on PATH
//! - [`GnuToolchain`]: `clang++` or `g++` from PATH

use super::sources::Language;
use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::os::HostOs;
use crate::process::{self, capture, ToolCommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One translation unit to compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileUnit {
    pub source: PathBuf,
    pub object: PathBuf,
    pub language: Language,
    /// Macro names defined on top of the toolchain's own
    pub macros: Vec<String>,
    pub includes: Vec<PathBuf>,
}

/// A compiler plus linker
pub trait Toolchain {
    fn name(&self) -> &str;

    /// Object file extension without the dot
    fn object_extension(&self) -> &str;

    /// Macros defined for every package source
    fn package_macros(&self) -> Vec<String>;

    /// Macros defined for generated resource units
    fn resource_macros(&self) -> Vec<String>;

    fn compile(&self, unit: &CompileUnit) -> BuildResult<()>;

    fn link(&self, objects: &[PathBuf], output: &Path) -> BuildResult<()>;
}

const MSVC_FLAGS: &[&str] = &[
    "/nologo",
    "/bigobj",
    "/D_CRT_SECURE_NO_WARNINGS",
    "/O2",
    "/std:c++17",
    "/EHsc",
    "/MT",
];

const MSVC_MACROS: &[&str] = &[
    "flagMSC",
    "flagWIN32",
    "flagBLITZ",
    "flagRELEASE",
    "flagSTATIC_Z",
    "flagSTATIC_PNG",
    "flagSTATIC_BZ2",
    "DYNAMIC_LIBCLANG",
];

const MSVC_LINK_FLAGS: &[&str] = &["/STACK:20000000", "/OPT:REF", "/OPT:ICF"];

const WIN32_LIBS: &[&str] = &[
    "kernel32.lib",
    "user32.lib",
    "gdi32.lib",
    "ole32.lib",
    "oleaut32.lib",
    "uuid.lib",
    "ws2_32.lib",
    "advapi32.lib",
    "shell32.lib",
    "winmm.lib",
    "mpr.lib",
    "crypt32.lib",
    "usp10.lib",
];

const MSVC_MISSING: &str =
    "MSVC (cl.exe) not found. Please run from a Developer Command Prompt or install Visual Studio.";

/// Microsoft C/C++ toolchain
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    ctx: BuildContext,
    cl: PathBuf,
    link: PathBuf,
}

impl MsvcToolchain {
    /// Locate `cl.exe`, capturing the Visual Studio environment if needed
    pub fn detect(ctx: &BuildContext) -> BuildResult<Self> {
        let ctx = if ctx.which("cl.exe").is_some() {
            ctx.clone()
        } else {
            let env = capture_msvc_env(ctx)?
                .ok_or_else(|| BuildError::toolchain(MSVC_MISSING))?;
            ctx.clone().with_env(env)
        };

        match (ctx.which("cl.exe"), ctx.which("link.exe")) {
            (Some(cl), Some(link)) => Ok(Self { ctx, cl, link }),
            _ => Err(BuildError::toolchain(
                "cl.exe or link.exe not found in captured environment.",
            )),
        }
    }
}

impl Toolchain for MsvcToolchain {
    fn name(&self) -> &str {
        "MSVC"
    }

    fn object_extension(&self) -> &str {
        "obj"
    }

    fn package_macros(&self) -> Vec<String> {
        MSVC_MACROS.iter().map(|m| m.to_string()).collect()
    }

    fn resource_macros(&self) -> Vec<String> {
        vec!["flagMSC".to_string(), "flagWIN32".to_string()]
    }

    fn compile(&self, unit: &CompileUnit) -> BuildResult<()> {
        let language_flag = match unit.language {
            Language::C => "/Tc",
            Language::Cxx => "/Tp",
        };
        let command = ToolCommand::new(&self.cl)
            .arg("/c")
            .args(MSVC_FLAGS)
            .args(unit.macros.iter().map(|m| format!("/D{}", m)))
            .args(unit.includes.iter().map(|i| format!("/I{}", i.display())))
            .arg(format!("/Fo{}", unit.object.display()))
            .arg(format!("{}{}", language_flag, unit.source.display()));

        let exit_code = process::run(&self.ctx, &command)?;
        if exit_code != 0 {
            return Err(BuildError::Compilation {
                file: unit.source.clone(),
                exit_code,
            });
        }
        Ok(())
    }

    fn link(&self, objects: &[PathBuf], output: &Path) -> BuildResult<()> {
        let command = ToolCommand::new(&self.link)
            .arg("/nologo")
            .arg(format!("/OUT:{}", output.display()))
            .args(MSVC_LINK_FLAGS)
            .args(objects)
            .args(WIN32_LIBS);

        let exit_code = process::run(&self.ctx, &command)?;
        if exit_code != 0 {
            return Err(BuildError::Link {
                output: output.to_path_buf(),
                exit_code,
            });
        }
        Ok(())
    }
}

/// Run `vcvarsall.bat x64` and snapshot the resulting environment
///
/// Returns `None` when Visual Studio cannot be located or the script fails.
pub fn capture_msvc_env(ctx: &BuildContext) -> BuildResult<Option<BTreeMap<String, String>>> {
    let Some(vcvarsall) = find_vcvarsall(ctx) else {
        return Ok(None);
    };

    let script = format!("\"{}\" x64 && set", vcvarsall.display());
    let output = capture(ctx, &ToolCommand::new("cmd").args(["/C", script.as_str()]))?;
    if !output.success() {
        debug!(exit_code = output.exit_code, "vcvarsall.bat failed");
        return Ok(None);
    }

    let mut env = ctx.env().clone();
    env.extend(parse_env_dump(&output.stdout));
    Ok(Some(env))
}

/// Parse `set` output into upper-cased `KEY=value` pairs
pub fn parse_env_dump(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_uppercase(), value.trim_end_matches('\r').to_string()))
        .collect()
}

fn find_vcvarsall(ctx: &BuildContext) -> Option<PathBuf> {
    let program_files = ctx
        .env_var("ProgramFiles(x86)")
        .unwrap_or("C:\\Program Files (x86)");
    let vswhere = Path::new(program_files)
        .join("Microsoft Visual Studio")
        .join("Installer")
        .join("vswhere.exe");
    if !vswhere.exists() {
        return None;
    }

    let output = capture(
        ctx,
        &ToolCommand::new(&vswhere).args(["-latest", "-property", "installationPath"]),
    )
    .ok()
    .filter(|o| o.success())?;

    let vcvarsall = Path::new(output.stdout.trim())
        .join("VC")
        .join("Auxiliary")
        .join("Build")
        .join("vcvarsall.bat");
    vcvarsall.exists().then_some(vcvarsall)
}

const GNU_FLAGS: &[&str] = &["-O2", "-std=c++17", "-fpermissive", "-w"];

const GNU_LIBS: &[&str] = &["-lpthread", "-ldl"];

/// Known GNU-compatible compiler pairs: C++ driver and C driver
pub const GNU_COMPILERS: &[(&str, &str)] = &[("clang++", "clang"), ("g++", "gcc")];

/// GCC or Clang
#[derive(Debug, Clone)]
pub struct GnuToolchain {
    ctx: BuildContext,
    cxx: PathBuf,
    cc: Option<PathBuf>,
}

impl GnuToolchain {
    /// First known compiler found on the context's PATH
    pub fn detect(ctx: &BuildContext) -> BuildResult<Self> {
        GNU_COMPILERS
            .iter()
            .find_map(|(cxx, cc)| {
                ctx.which(cxx).map(|cxx| Self {
                    ctx: ctx.clone(),
                    cxx,
                    cc: ctx.which(cc),
                })
            })
            .ok_or_else(|| {
                BuildError::toolchain(
                    "No C++ compiler found. Install clang++ or g++, or configure a bootstrap \
                     Makefile (UPPB_BOOTSTRAP_MAKEFILE).",
                )
            })
    }

    /// Use explicit compiler paths
    pub fn with_compilers(ctx: &BuildContext, cxx: impl Into<PathBuf>, cc: Option<PathBuf>) -> Self {
        Self {
            ctx: ctx.clone(),
            cxx: cxx.into(),
            cc,
        }
    }

    fn os_macro(&self) -> &'static str {
        match self.ctx.os() {
            HostOs::FreeBsd => "flagFREEBSD",
            _ => "flagLINUX",
        }
    }
}

impl Toolchain for GnuToolchain {
    fn name(&self) -> &str {
        "GNU"
    }

    fn object_extension(&self) -> &str {
        "o"
    }

    fn package_macros(&self) -> Vec<String> {
        [
            "flagGCC",
            "flagPOSIX",
            self.os_macro(),
            "flagBLITZ",
            "flagRELEASE",
            "flagSTATIC_Z",
            "flagSTATIC_PNG",
            "flagSTATIC_BZ2",
        ]
        .iter()
        .map(|m| m.to_string())
        .collect()
    }

    fn resource_macros(&self) -> Vec<String> {
        vec!["flagGCC".to_string(), "flagPOSIX".to_string()]
    }

    fn compile(&self, unit: &CompileUnit) -> BuildResult<()> {
        let mut command = match (unit.language, &self.cc) {
            (Language::C, Some(cc)) => ToolCommand::new(cc).args(["-x", "c"]),
            (Language::C, None) => ToolCommand::new(&self.cxx).args(["-x", "c"]),
            (Language::Cxx, _) => ToolCommand::new(&self.cxx).args(["-x", "c++"]).args(GNU_FLAGS),
        };
        if unit.language == Language::C {
            command = command.args(["-O2", "-w"]);
        }
        let command = command
            .arg("-c")
            .args(unit.macros.iter().map(|m| format!("-D{}", m)))
            .args(unit.includes.iter().map(|i| format!("-I{}", i.display())))
            .arg("-o")
            .arg(&unit.object)
            .arg(&unit.source);

        let exit_code = process::run(&self.ctx, &command)?;
        if exit_code != 0 {
            return Err(BuildError::Compilation {
                file: unit.source.clone(),
                exit_code,
            });
        }
        Ok(())
    }

    fn link(&self, objects: &[PathBuf], output: &Path) -> BuildResult<()> {
        let command = ToolCommand::new(&self.cxx)
            .arg("-o")
            .arg(output)
            .args(objects)
            .args(GNU_LIBS);

        let exit_code = process::run(&self.ctx, &command)?;
        if exit_code != 0 {
            return Err(BuildError::Link {
                output: output.to_path_buf(),
                exit_code,
            });
        }
        Ok(())
    }
}
