//! Configuration, method and flag selection
//!
//! Turns the user's intent (explicit mainconfig, release/debug mode, method
//! token, Android, smoke test) plus the package's mainconfigs and the
//! available methods into one [`SelectionResult`].

use crate::error::{BuildError, BuildResult};
use crate::method::BuildMethod;
use crate::os::HostOs;
use crate::registry::{find_android, MethodRegistry};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use uppb_config::MainConfigEntry;

/// Flag requesting full debug info
pub const DEBUG_FULL: &str = "DEBUG_FULL";

/// Alternate spelling of [`DEBUG_FULL`]
pub const FULL_DEBUG: &str = "FULL_DEBUG";

/// Flag appended in smoke-test mode
pub const SMOKETEST_FLAG: &str = "UWP_SMOKETEST";

/// Requested mainconfig mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfMode {
    Release,
    Debug,
}

impl ConfMode {
    /// Keyword searched for in mainconfig names
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for ConfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// What the user asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionOptions {
    /// `--conf-release` / `--conf-debug`
    pub conf_mode: Option<ConfMode>,
    /// `--mainconf` index or name
    pub mainconf: Option<String>,
    /// `--release`: release driver mode, no DEBUG_FULL
    pub release: bool,
    /// `--method` token
    pub method: Option<String>,
    pub android: bool,
    pub smoketest: bool,
    pub clean: bool,
    pub jobs: Option<u32>,
}

/// A mainconfig chosen by position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedConfig {
    pub index: usize,
    pub entry: MainConfigEntry,
}

/// Outcome of selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    pub config: Option<SelectedConfig>,
    pub method: BuildMethod,
    /// Comma-joined composed flags, possibly empty
    pub flags: String,
    /// Driver mode token such as `-bsdH1`
    pub driver_mode: String,
}

/// A config naming only the other platform is ineligible
pub fn config_matches_os(name: &str, os: HostOs) -> bool {
    let lower = name.to_lowercase();
    if lower.contains("windows") && !os.is_windows() {
        return false;
    }
    if lower.contains("posix") && os.is_windows() {
        return false;
    }
    true
}

/// First OS-eligible config, narrowed to `mode` when given
pub fn select_config(
    configs: &[MainConfigEntry],
    mode: Option<ConfMode>,
    os: HostOs,
) -> Option<SelectedConfig> {
    configs
        .iter()
        .enumerate()
        .filter(|(_, cfg)| config_matches_os(&cfg.name, os))
        .find(|(_, cfg)| match mode {
            Some(mode) => cfg.name.to_lowercase().contains(mode.keyword()),
            None => true,
        })
        .map(|(index, entry)| SelectedConfig {
            index,
            entry: entry.clone(),
        })
}

/// Config by numeric index or case-insensitive name
pub fn select_config_by_token(
    configs: &[MainConfigEntry],
    token: &str,
) -> BuildResult<SelectedConfig> {
    let token = token.trim();
    if let Ok(index) = token.parse::<usize>() {
        return configs
            .get(index)
            .map(|entry| SelectedConfig {
                index,
                entry: entry.clone(),
            })
            .ok_or_else(|| {
                BuildError::resolution(
                    format!("Mainconfig index out of range: {}", index),
                    config_alternatives(configs.iter().enumerate()),
                )
            });
    }

    configs
        .iter()
        .enumerate()
        .find(|(_, cfg)| cfg.name.eq_ignore_ascii_case(token))
        .map(|(index, entry)| SelectedConfig {
            index,
            entry: entry.clone(),
        })
        .ok_or_else(|| {
            BuildError::resolution(
                format!("Unknown mainconfig: {}", token),
                config_alternatives(configs.iter().enumerate()),
            )
        })
}

/// Apply config precedence: explicit token, explicit mode, implicit debug
pub fn resolve_config(
    options: &SelectionOptions,
    configs: &[MainConfigEntry],
    os: HostOs,
) -> BuildResult<Option<SelectedConfig>> {
    if options.conf_mode.is_some() && options.mainconf.is_some() {
        return Err(BuildError::usage(
            "Use either --conf-* or --mainconf, not both.",
        ));
    }

    if let Some(token) = &options.mainconf {
        return select_config_by_token(configs, token).map(Some);
    }

    if let Some(mode) = options.conf_mode {
        return select_config(configs, Some(mode), os).map(Some).ok_or_else(|| {
            BuildError::resolution(
                format!("No matching mainconfig for {}", mode),
                eligible_alternatives(configs, os),
            )
        });
    }

    let selected = if options.release {
        select_config(configs, None, os)
    } else {
        select_config(configs, Some(ConfMode::Debug), os)
            .or_else(|| select_config(configs, None, os))
    };

    if selected.is_none() && !configs.is_empty() {
        return Err(BuildError::resolution(
            "No mainconfig matches this OS",
            config_alternatives(configs.iter().enumerate()),
        ));
    }
    Ok(selected)
}

/// Split on commas and whitespace, strip stray `,;`, drop empties
pub fn split_flags(flags: &str) -> Vec<String> {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    let re = SEPARATORS.get_or_init(|| Regex::new(r"[\s,]+").expect("valid regex"));
    re.split(flags.trim())
        .map(|token| token.trim_matches(|c| c == ',' || c == ';'))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical comma-joined form of a raw flag string
pub fn normalize_flags(flags: &str) -> String {
    split_flags(flags).join(",")
}

/// Drop any DEBUG_FULL spelling and re-append it for non-release builds
pub fn apply_debug_full(flags: &[String], release: bool) -> Vec<String> {
    if flags.is_empty() {
        return Vec::new();
    }
    let mut filtered: Vec<String> = flags
        .iter()
        .filter(|flag| {
            let check = flag.trim_start_matches('.');
            check != DEBUG_FULL && check != FULL_DEBUG
        })
        .cloned()
        .collect();
    if !release {
        filtered.push(DEBUG_FULL.to_string());
    }
    filtered
}

/// Final flag string for the driver's `+` argument
pub fn compose_flags(config: Option<&MainConfigEntry>, release: bool, smoketest: bool) -> String {
    let mut flags = config
        .map(|cfg| split_flags(&cfg.flags))
        .unwrap_or_default();

    flags = if flags.is_empty() {
        if release {
            Vec::new()
        } else {
            vec![DEBUG_FULL.to_string()]
        }
    } else {
        apply_debug_full(&flags, release)
    };

    if smoketest {
        flags.push(SMOKETEST_FLAG.to_string());
    }
    flags.join(",")
}

/// Driver mode token; an explicit job count drops the embedded `H<n>`
pub fn driver_mode_token(release: bool, clean: bool, jobs: Option<u32>) -> String {
    static JOBS: OnceLock<Regex> = OnceLock::new();
    let mut token = if release { "-bsH1" } else { "-bsdH1" }.to_string();
    if clean {
        token.push('a');
    }
    if jobs.is_some() {
        let re = JOBS.get_or_init(|| Regex::new(r"H\d+").expect("valid regex"));
        token = re.replace_all(&token, "").into_owned();
    }
    token
}

/// Apply method precedence: explicit token, Android, registry default
pub fn select_method(
    options: &SelectionOptions,
    methods: &[BuildMethod],
    registry: &MethodRegistry,
) -> BuildResult<BuildMethod> {
    let mut resolved = match &options.method {
        Some(token) => Some(registry.resolve(methods, token)?),
        None => None,
    };

    if options.android {
        if let Some(method) = &resolved {
            if !method.is_android() {
                return Err(BuildError::resolution(
                    format!("Selected method is not an Android builder: {}", method.name),
                    android_alternatives(methods),
                ));
            }
        } else {
            resolved = find_android(methods).cloned();
            if resolved.is_none() {
                return Err(BuildError::resolution(
                    "No Android build method found",
                    all_method_names(methods),
                ));
            }
        }
    }

    let method = match resolved {
        Some(method) => method,
        None => registry.default_method(methods)?.ok_or_else(|| {
            BuildError::resolution("No suitable build method found", Vec::new())
        })?,
    };

    if !method.path.exists() {
        return Err(BuildError::resolution(
            format!("Build model not found: {}", method.path.display()),
            all_method_names(methods),
        ));
    }
    Ok(method)
}

/// Full selection for one target
pub fn select(
    options: &SelectionOptions,
    configs: &[MainConfigEntry],
    methods: &[BuildMethod],
    registry: &MethodRegistry,
) -> BuildResult<SelectionResult> {
    let config = resolve_config(options, configs, registry.os())?;
    let flags = compose_flags(
        config.as_ref().map(|c| &c.entry),
        options.release,
        options.smoketest,
    );
    let method = select_method(options, methods, registry)?;
    let driver_mode = driver_mode_token(options.release, options.clean, options.jobs);

    Ok(SelectionResult {
        config,
        method,
        flags,
        driver_mode,
    })
}

/// `--list-conf` output
pub fn format_config_list(configs: &[MainConfigEntry]) -> String {
    if configs.is_empty() {
        return "No mainconfig entries found.".to_string();
    }
    configs
        .iter()
        .enumerate()
        .map(|(idx, cfg)| format!("[{}] {} = {}", idx, cfg.name, cfg.flags))
        .collect::<Vec<_>>()
        .join("\n")
}

fn config_alternatives<'a>(
    configs: impl Iterator<Item = (usize, &'a MainConfigEntry)>,
) -> Vec<String> {
    configs
        .map(|(idx, cfg)| format!("[{}] {}", idx, cfg.name))
        .collect()
}

/// Eligible configs, or every config when none is eligible
fn eligible_alternatives(configs: &[MainConfigEntry], os: HostOs) -> Vec<String> {
    let eligible: Vec<_> = configs
        .iter()
        .enumerate()
        .filter(|(_, cfg)| config_matches_os(&cfg.name, os))
        .collect();
    if eligible.is_empty() {
        config_alternatives(configs.iter().enumerate())
    } else {
        config_alternatives(eligible.into_iter())
    }
}

fn all_method_names(methods: &[BuildMethod]) -> Vec<String> {
    methods.iter().map(|m| m.display.clone()).collect()
}

fn android_alternatives(methods: &[BuildMethod]) -> Vec<String> {
    methods
        .iter()
        .filter(|m| m.is_android())
        .map(|m| m.display.clone())
        .collect()
}
