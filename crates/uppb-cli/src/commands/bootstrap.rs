//! Bootstrap command - build `umk` from source without an existing driver

use anyhow::Result;
use tracing::warn;
use uppb_build::{BootstrapBuilder, BootstrapOptions, BuildContext, BuildError, InstallOutcome};
use uppb_config::Settings;

/// Targets `--bootstrap` accepts
pub const BOOTSTRAP_TARGETS: &[&str] = &["umk", "umk.upp", "uppsrc/umk/umk.upp"];

/// Bootstrap command arguments
#[derive(Debug, Default)]
pub struct BootstrapArgs {
    pub target: Option<String>,
    pub clean: bool,
    pub jobs: Option<u32>,
}

/// Whether `target` names the driver package
pub fn is_bootstrap_target(target: &str) -> bool {
    let normalized = target.replace('\\', "/").to_lowercase();
    BOOTSTRAP_TARGETS.contains(&normalized.as_str())
}

/// Run the bootstrap command
pub fn run(args: BootstrapArgs, settings: &Settings) -> Result<()> {
    if let Some(target) = &args.target {
        if !is_bootstrap_target(target) {
            return Err(BuildError::usage("--bootstrap can only be used to build umk.").into());
        }
    }

    let ctx = BuildContext::from_process_env(&settings.repo_root);
    let report = BootstrapBuilder::new(ctx, settings)
        .with_options(BootstrapOptions {
            clean: args.clean,
            jobs: args.jobs,
        })
        .build()?;

    if let InstallOutcome::MovedAside(old) = &report.outcome {
        warn!("Previous binary was in use and moved to {}", old.display());
    }
    println!("Executable compiled: {}", report.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("umk", true)]
    #[case("UMK.upp", true)]
    #[case("uppsrc\\umk\\umk.upp", true)]
    #[case("ide", false)]
    #[case("uppsrc/ide/ide.upp", false)]
    fn test_bootstrap_targets(#[case] target: &str, #[case] accepted: bool) {
        assert_eq!(is_bootstrap_target(target), accepted);
    }

    #[test]
    fn test_other_target_is_usage_error() {
        let settings = Settings::defaults("/nonexistent");
        let args = BootstrapArgs {
            target: Some("ide".to_string()),
            ..Default::default()
        };
        let err = run(args, &settings).unwrap_err();
        let build_error = err.downcast_ref::<BuildError>().unwrap();
        assert_eq!(build_error.exit_code(), 2);
    }
}
