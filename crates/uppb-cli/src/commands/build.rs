//! Build command - resolve configuration and method, then run `umk`

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;
use uppb_build::command::{copy_sidecars, execute, resolve_driver_path};
use uppb_build::selection::select;
use uppb_build::{
    ArtifactSwapper, BuildContext, BuildError, BuildInvocation, MethodRegistry, OutputPlan,
    SelectionOptions, SelectionResult,
};
use uppb_config::descriptor::read_mainconfigs;
use uppb_config::locator::package_name;
use uppb_config::{PackageLocator, Settings};

/// Build command arguments
#[derive(Debug, Default)]
pub struct BuildArgs {
    /// Package name, directory or descriptor path
    pub target: String,
    pub selection: SelectionOptions,
    /// Print the assembled driver command instead of running it
    pub dump_cmd: bool,
    pub verbose: bool,
}

/// Run the build command
pub fn run(args: BuildArgs, settings: &Settings) -> Result<()> {
    let ctx = BuildContext::from_process_env(&settings.repo_root);

    let descriptor = PackageLocator::new(&settings.repo_root)
        .with_search_roots(&settings.package_roots)
        .resolve(&args.target)
        .map_err(BuildError::from)?;
    let target = package_name(&descriptor);
    let configs = read_mainconfigs(&descriptor).map_err(BuildError::from)?;

    let registry = MethodRegistry::from_settings(&ctx, settings);
    let methods = registry.collect()?;
    let selection = select(&args.selection, &configs, &methods, &registry)?;
    if args.verbose {
        log_selection(&selection);
    }

    let driver = resolve_driver_path(&settings.repo_root)?;
    let output_dir = settings.output_path();
    let plan = OutputPlan::new(&output_dir, &target, ctx.os(), std::process::id());
    let invocation = BuildInvocation {
        driver,
        roots: settings.driver_roots.join(","),
        target,
        method: selection.method.path.clone(),
        mode: selection.driver_mode.clone(),
        jobs: args.selection.jobs,
        flags: selection.flags.clone(),
        output: plan.build_path().to_path_buf(),
    };

    if args.dump_cmd {
        println!("{}", invocation);
        return Ok(());
    }

    info!("Command: {}", invocation);
    execute(&ctx, &invocation, &plan, &ArtifactSwapper::new())?;

    copy_sidecars(&descriptor, &output_dir, &settings.sidecar_extensions)?;
    report_output(plan.output);
    Ok(())
}

fn log_selection(selection: &SelectionResult) {
    match &selection.config {
        Some(config) => info!("Mainconfig: [{}] {}", config.index, config.entry.name),
        None => info!("Mainconfig: (none)"),
    }
    let flags = if selection.flags.is_empty() {
        "(none)"
    } else {
        selection.flags.as_str()
    };
    info!("Flags: {}", flags);
    info!("Build model: {}", selection.method);
    info!("Build flags: {}", selection.driver_mode);
}

fn report_output(output: PathBuf) {
    if output.exists() {
        println!("Executable compiled: {}", output.display());
    }
}
