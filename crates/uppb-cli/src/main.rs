use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uppb_build::{BuildError, ConfMode, SelectionOptions, EXIT_INSTALL, EXIT_USAGE};
use uppb_config::{ConfigError, ConfigLoader, Settings};

mod commands;
mod config;
mod legacy;

/// Build U++ targets through the umk build driver.
///
/// Resolves the package descriptor for TARGET, picks a mainconfig and a build
/// method, and runs umk with the composed flags. With --bootstrap, builds umk
/// itself from source using the host compiler.
///
/// Every option also accepts its legacy spelling (-ConfRelease, -cr, -mc0,
/// -mGCC, -j8), case-insensitively.
///
/// EXAMPLES:
///     uppb -cr -r Eon00               Release mainconfig, release build
///     uppb --mainconf 0 Eon00         Select a mainconfig by index
///     uppb --list-methods             Show available build methods
///     uppb --bootstrap                Build umk from source
///     uppb tutorial                   More examples
///
/// ENVIRONMENT VARIABLES:
///     UPPB_REPO_ROOT           Repository root (contains uppsrc/)
///     UPPB_BOOTSTRAP_MAKEFILE  Makefile used for POSIX bootstrap
///     UPP_BM, UPP_BUILD_MODEL  Build method file used by default
///     UPPB_LOG                 Log filter (falls back to RUST_LOG)
#[derive(Parser, Debug)]
#[command(name = "uppb")]
#[command(version)]
struct Cli {
    /// Package name, package directory or .upp file; `tutorial` prints examples
    #[arg(value_name = "TARGET")]
    targets: Vec<String>,

    /// Select the Release mainconfig
    #[arg(long, overrides_with = "conf_debug")]
    conf_release: bool,

    /// Select the Debug mainconfig
    #[arg(long, overrides_with = "conf_release")]
    conf_debug: bool,

    /// Select a mainconfig by index or name
    #[arg(long, value_name = "X")]
    mainconf: Option<String>,

    /// List the mainconfigs of a package and exit
    #[arg(long, value_name = "P")]
    list_conf: Option<String>,

    /// Use release build flags in umk
    #[arg(long)]
    release: bool,

    /// Select a build method by index, name or path
    #[arg(long, value_name = "X")]
    method: Option<String>,

    /// List build methods and exit
    #[arg(long)]
    list_methods: bool,

    /// Select an Android build method (BUILDER=ANDROID)
    #[arg(long)]
    android: bool,

    /// Build umk from source
    #[arg(long)]
    bootstrap: bool,

    /// Build a single source file (UWP smoke test)
    #[arg(long)]
    smoketest: bool,

    /// Clean build
    #[arg(long)]
    clean: bool,

    /// Parallel jobs
    #[arg(long, value_name = "N", value_parser = parse_jobs)]
    jobs: Option<u32>,

    /// Verbose output
    #[arg(long)]
    verbose: bool,

    /// Print the umk command and exit
    #[arg(long)]
    dump_cmd: bool,

    /// Repository root (defaults to UPPB_REPO_ROOT or the nearest directory containing uppsrc/)
    #[arg(long, value_name = "DIR")]
    repo_root: Option<PathBuf>,
}

impl Cli {
    fn conf_mode(&self) -> Option<ConfMode> {
        if self.conf_release {
            Some(ConfMode::Release)
        } else if self.conf_debug {
            Some(ConfMode::Debug)
        } else {
            None
        }
    }

    fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            conf_mode: self.conf_mode(),
            mainconf: self.mainconf.clone(),
            release: self.release,
            method: self.method.clone(),
            android: self.android,
            smoketest: self.smoketest,
            clean: self.clean,
            jobs: self.jobs,
        }
    }
}

fn parse_jobs(value: &str) -> Result<u32, String> {
    let jobs: i64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid jobs value: {}", value))?;
    if jobs <= 0 {
        return Err("Jobs must be positive".to_string());
    }
    u32::try_from(jobs).map_err(|_| format!("Invalid jobs value: {}", value))
}

const TUTORIAL: &str = "\
Build tutorial

Common usage:
  uppb --conf-release --release Eon00
  uppb -cr -r Eon00
  uppb --conf-debug --release Eon04
  uppb -cd -r Eon04

Select a mainconfig explicitly:
  uppb --list-conf Eon00
  uppb --mainconf 0 Eon00
  uppb --mainconf \"Release (Posix)\" Eon07

Control method selection:
  uppb --list-methods
  uppb --method 0 Eon00
  uppb --android --method ANDROID Eon00

Bootstrap umk:
  uppb --bootstrap";

fn init_logging(verbose: bool) {
    let config = config::Config::from_env();
    let filter = EnvFilter::try_new(config.log_filter(verbose))
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    Ok(ConfigLoader::new().load(cli.repo_root.as_deref(), &cwd)?)
}

fn run(cli: Cli) -> Result<()> {
    if cli.targets.len() > 1 {
        return Err(BuildError::usage("Only one target is supported").into());
    }
    let target = cli.targets.first().cloned();

    if cli.list_methods {
        return commands::list::methods(&load_settings(&cli)?);
    }

    if let Some(package) = &cli.list_conf {
        return commands::list::configs(&load_settings(&cli)?, package);
    }

    if cli.bootstrap {
        let args = commands::bootstrap::BootstrapArgs {
            target,
            clean: cli.clean,
            jobs: cli.jobs,
        };
        return commands::bootstrap::run(args, &load_settings(&cli)?);
    }

    let Some(target) = target else {
        eprintln!("{}", Cli::command().render_usage());
        return Err(BuildError::usage("Missing target.").into());
    };

    if target.eq_ignore_ascii_case("tutorial") {
        println!("{}", TUTORIAL);
        return Ok(());
    }

    let args = commands::build::BuildArgs {
        target,
        selection: cli.selection_options(),
        dump_cmd: cli.dump_cmd,
        verbose: cli.verbose,
    };
    commands::build::run(args, &load_settings(&cli)?)
}

/// Process exit code for a failed run
fn exit_code(error: &anyhow::Error) -> i32 {
    for cause in error.chain() {
        if let Some(build) = cause.downcast_ref::<BuildError>() {
            return build.exit_code();
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return EXIT_USAGE;
        }
    }
    EXIT_INSTALL
}

fn main() {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.is_empty() {
        let _ = Cli::command().print_long_help();
        std::process::exit(0);
    }

    let args = std::iter::once("uppb".to_string()).chain(legacy::normalize_args(raw));
    let cli = Cli::try_parse_from(args).unwrap_or_else(|e| e.exit());
    init_logging(cli.verbose);

    if let Err(error) = run(cli) {
        eprintln!("Error: {:#}", error);
        std::process::exit(exit_code(&error));
    }
}
