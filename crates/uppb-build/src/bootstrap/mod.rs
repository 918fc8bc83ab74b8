//! Self-hosting bootstrap of the `umk` driver
//!
//! Compiles the fixed package set under `uppsrc/` straight through a host
//! toolchain, without an existing driver:
//! 1. optional clean of the object directory
//! 2. `build_info.h` generation
//! 3. per package: embedded resources, then sources, skipping objects that
//!    are newer than their source
//! 4. link to a temporary name
//! 5. swap the temporary into `bin/umk[.exe]`
//!
//! POSIX hosts with a configured bootstrap Makefile delegate steps 1-4 to
//! `make` instead.

pub mod brc;
pub mod incremental;
pub mod makefile;
pub mod sources;
pub mod toolchain;
pub mod version_header;

use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::install::{discard, ArtifactSwapper, InstallOutcome};
use crate::process;
use incremental::needs_rebuild;
use makefile::BootstrapMakefile;
use sources::{object_name, BootstrapPackage, Language, BOOTSTRAP_PACKAGES, MAIN_MACRO};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use toolchain::{CompileUnit, GnuToolchain, MsvcToolchain, Toolchain};
use tracing::{debug, info, warn};
use uppb_config::loader::REPO_MARKER_DIR;
use uppb_config::Settings;
use version_header::BuildInfo;

/// Bootstrap options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Remove previous objects first
    pub clean: bool,
    /// Parallel jobs, honoured by the Makefile path only
    pub jobs: Option<u32>,
}

/// Summary of a finished bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Installed driver binary
    pub output: PathBuf,
    /// Translation units compiled in this run
    pub compiled: usize,
    /// Up-to-date objects reused
    pub reused: usize,
    pub outcome: InstallOutcome,
}

/// Builds the driver from source
#[derive(Debug, Clone)]
pub struct BootstrapBuilder {
    ctx: BuildContext,
    uppsrc: PathBuf,
    out_dir: PathBuf,
    output_dir: PathBuf,
    makefile: Option<PathBuf>,
    options: BootstrapOptions,
    swapper: ArtifactSwapper,
}

impl BootstrapBuilder {
    pub fn new(ctx: BuildContext, settings: &Settings) -> Self {
        Self {
            uppsrc: settings.repo_root.join(REPO_MARKER_DIR),
            out_dir: settings.bootstrap_out_path(),
            output_dir: settings.output_path(),
            makefile: settings.bootstrap_makefile.clone(),
            options: BootstrapOptions::default(),
            swapper: ArtifactSwapper::new(),
            ctx,
        }
    }

    pub fn with_options(mut self, options: BootstrapOptions) -> Self {
        self.options = options;
        self
    }

    /// Final driver path
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .join(self.ctx.os().exe_name(crate::command::DRIVER_PACKAGE))
    }

    fn temp_output_path(&self) -> PathBuf {
        self.output_dir.join(self.ctx.os().exe_name(&format!(
            "{}_tmp_{}",
            crate::command::DRIVER_PACKAGE,
            std::process::id()
        )))
    }

    /// Pick the host strategy and build
    pub fn build(&self) -> BuildResult<BootstrapReport> {
        self.check_uppsrc()?;

        if self.ctx.os().is_windows() {
            info!("Bootstrapping umk (Windows/MSVC)...");
            let toolchain = MsvcToolchain::detect(&self.ctx)?;
            return self.build_with(&toolchain);
        }

        match &self.makefile {
            Some(makefile) => self.build_with_makefile(makefile),
            None => {
                let toolchain = GnuToolchain::detect(&self.ctx)?;
                info!("Bootstrapping umk ({})...", toolchain.name());
                self.build_with(&toolchain)
            }
        }
    }

    fn check_uppsrc(&self) -> BuildResult<()> {
        if self.uppsrc.is_dir() {
            Ok(())
        } else {
            Err(BuildError::toolchain(format!(
                "Missing uppsrc directory: {}",
                self.uppsrc.display()
            )))
        }
    }

    /// Compile and link the package set with `toolchain`
    pub fn build_with(&self, toolchain: &dyn Toolchain) -> BuildResult<BootstrapReport> {
        let start = Instant::now();

        if self.options.clean && self.out_dir.exists() {
            info!("Cleaning {}", self.out_dir.display());
            fs::remove_dir_all(&self.out_dir).map_err(|e| BuildError::io(&self.out_dir, e))?;
        }
        fs::create_dir_all(&self.out_dir).map_err(|e| BuildError::io(&self.out_dir, e))?;

        BuildInfo::collect(&self.ctx).write(&self.out_dir)?;

        let includes = vec![self.uppsrc.clone(), self.out_dir.clone()];
        let mut stats = CompileStats::default();
        let mut objects = Vec::new();

        for name in BOOTSTRAP_PACKAGES {
            let package = BootstrapPackage::new(&self.uppsrc, name);
            let package_out = package.out_dir(&self.out_dir);
            fs::create_dir_all(&package_out).map_err(|e| BuildError::io(&package_out, e))?;

            for brc_file in brc::find_brc_files(&package.dir) {
                let generated = brc::generate(&brc_file, &package_out)?;
                let file_name = brc_file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let object = package_out.join(format!(
                    "{}_brc.{}",
                    file_name,
                    toolchain.object_extension()
                ));
                let unit = CompileUnit {
                    source: generated,
                    object,
                    language: Language::Cxx,
                    macros: toolchain.resource_macros(),
                    includes: includes.clone(),
                };
                objects.push(self.compile_if_stale(toolchain, &unit, &mut stats)?);
            }

            let sources = package.sources();
            if sources.is_empty() {
                warn!("No source files found for package {}", package.name);
                continue;
            }

            let mut macros = toolchain.package_macros();
            if package.is_entry() {
                macros.push(MAIN_MACRO.to_string());
            }

            for source in sources {
                let source_path = package.dir.join(&source);
                if !source_path.is_file() {
                    debug!("Skipping missing source: {}", source_path.display());
                    continue;
                }
                let unit = CompileUnit {
                    object: package_out.join(object_name(&source, toolchain.object_extension())),
                    language: Language::of(&source),
                    source: source_path,
                    macros: macros.clone(),
                    includes: includes.clone(),
                };
                if needs_rebuild(&unit.source, &unit.object) {
                    info!("Compiling {}/{}...", package.name, source);
                }
                objects.push(self.compile_if_stale(toolchain, &unit, &mut stats)?);
            }
        }

        fs::create_dir_all(&self.output_dir).map_err(|e| BuildError::io(&self.output_dir, e))?;
        let temp = self.temp_output_path();
        info!("Linking {}...", temp.display());
        if let Err(error) = toolchain.link(&objects, &temp) {
            discard(&temp);
            return Err(error);
        }

        let output = self.output_path();
        let outcome = self.swapper.install(&temp, &output)?;
        info!(
            compiled = stats.compiled,
            reused = stats.reused,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "bootstrap finished"
        );

        Ok(BootstrapReport {
            output,
            compiled: stats.compiled,
            reused: stats.reused,
            outcome,
        })
    }

    fn compile_if_stale(
        &self,
        toolchain: &dyn Toolchain,
        unit: &CompileUnit,
        stats: &mut CompileStats,
    ) -> BuildResult<PathBuf> {
        if needs_rebuild(&unit.source, &unit.object) {
            if let Err(error) = toolchain.compile(unit) {
                discard(&unit.object);
                return Err(error);
            }
            stats.compiled += 1;
        } else {
            stats.reused += 1;
        }
        Ok(unit.object.clone())
    }

    /// Run the configured Makefile and install what it produced
    fn build_with_makefile(&self, path: &Path) -> BuildResult<BootstrapReport> {
        let makefile = BootstrapMakefile::load(path)?;
        info!("Bootstrapping umk (make -f {})...", makefile.path().display());

        if self.options.clean {
            self.run_make(&makefile, makefile.clean_command(&self.uppsrc))?;
        }
        self.run_make(
            &makefile,
            makefile.build_command(&self.uppsrc, self.ctx.os(), self.options.jobs),
        )?;

        let built = self.uppsrc.join(makefile.out_file());
        if !built.is_file() {
            return Err(BuildError::toolchain(format!(
                "Bootstrap build did not produce {}",
                built.display()
            )));
        }

        fs::create_dir_all(&self.output_dir).map_err(|e| BuildError::io(&self.output_dir, e))?;
        let temp = self.temp_output_path();
        if let Err(error) = fs::copy(&built, &temp) {
            discard(&temp);
            return Err(BuildError::io(&built, error));
        }

        let output = self.output_path();
        let outcome = self.swapper.install(&temp, &output)?;
        Ok(BootstrapReport {
            output,
            compiled: 0,
            reused: 0,
            outcome,
        })
    }

    fn run_make(
        &self,
        makefile: &BootstrapMakefile,
        command: process::ToolCommand,
    ) -> BuildResult<()> {
        let exit_code = process::run(&self.ctx, &command)?;
        if exit_code != 0 {
            return Err(BuildError::Compilation {
                file: makefile.path().to_path_buf(),
                exit_code,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CompileStats {
    compiled: usize,
    reused: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::HostOs;
    use std::cell::RefCell;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Writes placeholder objects and records what it compiled
    #[derive(Default)]
    struct FakeToolchain {
        compiled: RefCell<Vec<PathBuf>>,
        fail_on: Option<&'static str>,
    }

    impl Toolchain for FakeToolchain {
        fn name(&self) -> &str {
            "fake"
        }

        fn object_extension(&self) -> &str {
            "o"
        }

        fn package_macros(&self) -> Vec<String> {
            vec!["flagRELEASE".to_string()]
        }

        fn resource_macros(&self) -> Vec<String> {
            Vec::new()
        }

        fn compile(&self, unit: &CompileUnit) -> BuildResult<()> {
            if let Some(fail) = self.fail_on {
                if unit.source.ends_with(fail) {
                    fs::write(&unit.object, "partial").unwrap();
                    return Err(BuildError::Compilation {
                        file: unit.source.clone(),
                        exit_code: 3,
                    });
                }
            }
            fs::write(&unit.object, unit.macros.join(" ")).unwrap();
            self.compiled.borrow_mut().push(unit.source.clone());
            Ok(())
        }

        fn link(&self, objects: &[PathBuf], output: &Path) -> BuildResult<()> {
            let names: Vec<String> = objects.iter().map(|o| o.display().to_string()).collect();
            fs::write(output, names.join("\n")).unwrap();
            Ok(())
        }
    }

    fn backdate(path: &Path, secs: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(secs))
            .unwrap();
    }

    fn touch_future(path: &Path) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
    }

    /// Repository with `Core` (two sources) and the entry package
    fn repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        let uppsrc = temp.path().join("uppsrc");
        let core = uppsrc.join("Core");
        let umk = uppsrc.join("umk");
        fs::create_dir_all(&core).unwrap();
        fs::create_dir_all(&umk).unwrap();

        fs::write(core.join("Core.upp"), "file\n\tCore.h,\n\tString.cpp,\n\tlib/z.c;\n").unwrap();
        fs::create_dir_all(core.join("lib")).unwrap();
        fs::write(core.join("String.cpp"), "").unwrap();
        fs::write(core.join("lib/z.c"), "").unwrap();
        fs::write(umk.join("umk.upp"), "file\n\tumake.cpp,\n\tgone.cpp;\n").unwrap();
        fs::write(umk.join("umake.cpp"), "").unwrap();

        for src in ["Core/String.cpp", "Core/lib/z.c", "umk/umake.cpp"] {
            backdate(&uppsrc.join(src), 120);
        }
        temp
    }

    fn builder(temp: &TempDir) -> BootstrapBuilder {
        let ctx = BuildContext::new(temp.path()).with_os(HostOs::Linux);
        BootstrapBuilder::new(ctx, &Settings::defaults(temp.path()))
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    #[test]
    fn test_first_build_compiles_everything() {
        let temp = repo();
        let toolchain = FakeToolchain::default();

        let report = builder(&temp).build_with(&toolchain).unwrap();

        assert_eq!(report.compiled, 3);
        assert_eq!(report.reused, 0);
        assert_eq!(report.outcome, InstallOutcome::Fresh);
        assert_eq!(report.output, temp.path().join("bin/umk"));
        assert!(temp.path().join("_out/build_info.h").is_file());
        assert!(temp.path().join("_out/Core/lib_z_c.o").is_file());

        let entry_object = fs::read_to_string(temp.path().join("_out/umk/umake_cpp.o")).unwrap();
        assert_eq!(entry_object, "flagRELEASE flagMAIN");
        let core_object = fs::read_to_string(temp.path().join("_out/Core/String_cpp.o")).unwrap();
        assert_eq!(core_object, "flagRELEASE");
    }

    #[test]
    fn test_second_build_is_idempotent() {
        let temp = repo();
        let b = builder(&temp);
        b.build_with(&FakeToolchain::default()).unwrap();

        let toolchain = FakeToolchain::default();
        let report = b.build_with(&toolchain).unwrap();

        assert_eq!(report.compiled, 0);
        assert_eq!(report.reused, 3);
        assert_eq!(report.outcome, InstallOutcome::Replaced);
        assert!(toolchain.compiled.borrow().is_empty());
    }

    #[test]
    fn test_touched_source_recompiles_alone() {
        let temp = repo();
        let b = builder(&temp);
        b.build_with(&FakeToolchain::default()).unwrap();

        let touched = temp.path().join("uppsrc/Core/String.cpp");
        touch_future(&touched);

        let toolchain = FakeToolchain::default();
        let report = b.build_with(&toolchain).unwrap();
        assert_eq!(report.compiled, 1);
        assert_eq!(*toolchain.compiled.borrow(), vec![touched]);
    }

    #[test]
    fn test_clean_forces_full_rebuild() {
        let temp = repo();
        builder(&temp).build_with(&FakeToolchain::default()).unwrap();

        let report = builder(&temp)
            .with_options(BootstrapOptions {
                clean: true,
                jobs: None,
            })
            .build_with(&FakeToolchain::default())
            .unwrap();
        assert_eq!(report.compiled, 3);
    }

    #[test]
    fn test_compile_failure_aborts_and_removes_partial_object() {
        let temp = repo();
        let toolchain = FakeToolchain {
            fail_on: Some("String.cpp"),
            ..Default::default()
        };

        let err = builder(&temp).build_with(&toolchain).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(!temp.path().join("_out/Core/String_cpp.o").exists());
        assert!(!temp.path().join("bin/umk").exists());
    }

    #[test]
    fn test_embedded_resources_are_compiled() {
        let temp = repo();
        let core = temp.path().join("uppsrc/Core");
        fs::write(core.join("logo.png"), [1u8, 2, 3]).unwrap();
        fs::write(core.join("Core.brc"), "BINARY(logo, \"logo.png\")\n").unwrap();

        let report = builder(&temp).build_with(&FakeToolchain::default()).unwrap();
        assert_eq!(report.compiled, 4);
        assert!(temp.path().join("_out/Core/Core.brc.cpp").is_file());
        assert!(temp.path().join("_out/Core/Core.brc_brc.o").is_file());
    }

    #[test]
    fn test_missing_uppsrc() {
        let temp = TempDir::new().unwrap();
        let err = builder(&temp).build().unwrap_err();
        assert!(err.to_string().starts_with("Missing uppsrc directory"));
        assert_eq!(err.exit_code(), 2);
    }
}
