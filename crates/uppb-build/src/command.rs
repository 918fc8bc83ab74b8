//! Build driver invocation
//!
//! Assembles the `umk` command line for an ordinary target, runs it, and
//! installs the result. When the target is the driver itself on Windows the
//! driver writes to a temporary name that is swapped into place afterwards.

use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::install::{discard, ArtifactSwapper, FileOps, InstallOutcome};
use crate::os::HostOs;
use crate::process::{self, ToolCommand};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Package name of the build driver
pub const DRIVER_PACKAGE: &str = "umk";

/// Ordered driver arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    pub driver: PathBuf,
    /// Comma-joined package roots
    pub roots: String,
    pub target: String,
    /// Profile file of the chosen method
    pub method: PathBuf,
    /// Driver mode token
    pub mode: String,
    pub jobs: Option<u32>,
    /// Comma-joined flags, without the `+` prefix
    pub flags: String,
    pub output: PathBuf,
}

impl BuildInvocation {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.roots.clone(),
            self.target.clone(),
            self.method.display().to_string(),
            self.mode.clone(),
        ];
        if let Some(jobs) = self.jobs {
            args.push(format!("-H{}", jobs));
        }
        if !self.flags.is_empty() {
            args.push(format!("+{}", self.flags));
        }
        args.push(self.output.display().to_string());
        args
    }

    pub fn to_command(&self) -> ToolCommand {
        ToolCommand::new(&self.driver).args(self.args())
    }
}

impl fmt::Display for BuildInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.driver.display())?;
        for arg in self.args() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Where the driver writes and where the result ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// Final executable path
    pub output: PathBuf,
    /// Temporary path the driver writes to, when a swap is needed
    pub temp: Option<PathBuf>,
}

impl OutputPlan {
    /// Plan the output for `target` in `output_dir`
    pub fn new(output_dir: &Path, target: &str, os: HostOs, pid: u32) -> Self {
        let output = output_dir.join(os.exe_name(target));
        let temp = (os.is_windows() && target.eq_ignore_ascii_case(DRIVER_PACKAGE))
            .then(|| output_dir.join(os.exe_name(&format!("{}_tmp_{}", target, pid))));
        Self { output, temp }
    }

    /// Path handed to the driver
    pub fn build_path(&self) -> &Path {
        self.temp.as_deref().unwrap_or(&self.output)
    }
}

/// Existing driver binary under `<repo>/bin`
pub fn resolve_driver_path(repo_root: &Path) -> BuildResult<PathBuf> {
    let bin = repo_root.join("bin");
    [DRIVER_PACKAGE.to_string(), format!("{}.exe", DRIVER_PACKAGE)]
        .iter()
        .map(|name| bin.join(name))
        .find(|path| path.exists())
        .ok_or_else(|| {
            BuildError::toolchain(format!(
                "umk executable not found. Please ensure 'umk.exe' (Windows) or 'umk' (Posix) \
                 is in {}, or run with --bootstrap to build it from source.",
                bin.display()
            ))
        })
}

/// Run the driver and install its output
pub fn execute<F: FileOps>(
    ctx: &BuildContext,
    invocation: &BuildInvocation,
    plan: &OutputPlan,
    swapper: &ArtifactSwapper<F>,
) -> BuildResult<Option<InstallOutcome>> {
    if let Some(parent) = plan.output.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }

    let exit_code = process::run(ctx, &invocation.to_command())?;
    if exit_code != 0 {
        if let Some(temp) = &plan.temp {
            discard(temp);
        }
        return Err(BuildError::Driver { exit_code });
    }

    match &plan.temp {
        Some(temp) if temp.exists() => swapper.install(temp, &plan.output).map(Some),
        _ => Ok(None),
    }
}

/// Copy sidecar files next to the descriptor into the output directory
pub fn copy_sidecars(
    descriptor: &Path,
    output_dir: &Path,
    extensions: &[String],
) -> BuildResult<Vec<PathBuf>> {
    let Some(package_dir) = descriptor.parent() else {
        return Ok(Vec::new());
    };
    let entries = fs::read_dir(package_dir).map_err(|e| BuildError::io(package_dir, e))?;

    let mut sources: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| extensions.iter().any(|want| want == ext))
        })
        .collect();
    sources.sort();

    if sources.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(output_dir).map_err(|e| BuildError::io(output_dir, e))?;

    let mut copied = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = output_dir.join(name);
        fs::copy(&source, &dest).map_err(|e| BuildError::io(&source, e))?;
        debug!("Copied: {} -> {}", source.display(), dest.display());
        copied.push(dest);
    }
    info!(count = copied.len(), "sidecar files copied");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn invocation() -> BuildInvocation {
        BuildInvocation {
            driver: PathBuf::from("bin/umk"),
            roots: "./uppsrc,./examples".to_string(),
            target: "Eon00".to_string(),
            method: PathBuf::from("/tmp/upp_build_methods/GCC.bm"),
            mode: "-bsd".to_string(),
            jobs: Some(4),
            flags: "GUI,DEBUG_FULL".to_string(),
            output: PathBuf::from("bin/Eon00"),
        }
    }

    #[test]
    fn test_argument_order() {
        assert_eq!(
            invocation().to_string(),
            "bin/umk ./uppsrc,./examples Eon00 /tmp/upp_build_methods/GCC.bm -bsd -H4 +GUI,DEBUG_FULL bin/Eon00"
        );
    }

    #[test]
    fn test_optional_arguments_omitted() {
        let mut inv = invocation();
        inv.jobs = None;
        inv.flags.clear();
        inv.mode = "-bsH1".to_string();
        assert_eq!(
            inv.args(),
            vec![
                "./uppsrc,./examples",
                "Eon00",
                "/tmp/upp_build_methods/GCC.bm",
                "-bsH1",
                "bin/Eon00"
            ]
        );
    }

    #[test]
    fn test_output_plan() {
        let plan = OutputPlan::new(Path::new("bin"), "Eon00", HostOs::Linux, 42);
        assert_eq!(plan.build_path(), Path::new("bin/Eon00"));
        assert_eq!(plan.temp, None);

        let plan = OutputPlan::new(Path::new("bin"), "umk", HostOs::Windows, 42);
        assert_eq!(plan.output, PathBuf::from("bin/umk.exe"));
        assert_eq!(plan.build_path(), Path::new("bin/umk_tmp_42.exe"));

        let plan = OutputPlan::new(Path::new("bin"), "umk", HostOs::Linux, 42);
        assert_eq!(plan.temp, None);
    }

    #[test]
    fn test_missing_driver() {
        let temp = TempDir::new().unwrap();
        let err = resolve_driver_path(temp.path()).unwrap_err();
        assert!(matches!(err, BuildError::Toolchain(_)));
        assert_eq!(err.exit_code(), 2);

        fs::create_dir_all(temp.path().join("bin")).unwrap();
        fs::write(temp.path().join("bin/umk.exe"), "").unwrap();
        assert_eq!(
            resolve_driver_path(temp.path()).unwrap(),
            temp.path().join("bin/umk.exe")
        );
    }

    #[test]
    fn test_copy_sidecars() {
        let temp = TempDir::new().unwrap();
        let pkg = temp.path().join("uppsrc/Eon00");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("Eon00.upp"), "").unwrap();
        fs::write(pkg.join("Scene.eon"), "scene").unwrap();
        fs::write(pkg.join("Eon00.cpp"), "").unwrap();

        let out = temp.path().join("bin");
        let copied = copy_sidecars(&pkg.join("Eon00.upp"), &out, &["eon".to_string()]).unwrap();

        assert_eq!(copied, vec![out.join("Scene.eon")]);
        assert_eq!(fs::read_to_string(out.join("Scene.eon")).unwrap(), "scene");
        assert!(!out.join("Eon00.cpp").exists());
    }
}
