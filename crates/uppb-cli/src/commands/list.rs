//! `--list-methods` and `--list-conf`

use anyhow::Result;
use uppb_build::registry::format_method_list;
use uppb_build::selection::format_config_list;
use uppb_build::{BuildContext, BuildError, MethodRegistry};
use uppb_config::descriptor::read_mainconfigs;
use uppb_config::{PackageLocator, Settings};

/// Print every build method available on this host
pub fn methods(settings: &Settings) -> Result<()> {
    let ctx = BuildContext::from_process_env(&settings.repo_root);
    let methods = MethodRegistry::from_settings(&ctx, settings).collect()?;
    println!("{}", format_method_list(&methods));
    Ok(())
}

/// Print the mainconfigs of `package`
pub fn configs(settings: &Settings, package: &str) -> Result<()> {
    let descriptor = PackageLocator::new(&settings.repo_root)
        .with_search_roots(&settings.package_roots)
        .resolve(package)
        .map_err(BuildError::from)?;
    let configs = read_mainconfigs(&descriptor).map_err(BuildError::from)?;
    println!("{}", format_config_list(&configs));
    Ok(())
}
