//! Legacy option spellings
//!
//! Every option is also accepted as a single-dash camel-case word
//! (`-ConfRelease`) and as a short alias (`-cr`), case-insensitively, and
//! value options accept glued values (`-mc0`, `-mGCC`, `-j8`). This module
//! rewrites all of those into the GNU long form before clap sees them.

/// Long option and the spellings that map to it
const SPELLINGS: &[(&str, &[&str])] = &[
    ("--help", &["--help", "-help", "-h"]),
    ("--conf-release", &["--conf-release", "-confrelease", "-cr"]),
    ("--conf-debug", &["--conf-debug", "-confdebug", "-cd"]),
    ("--list-conf", &["--list-conf", "-list-conf", "-listconf", "-lc"]),
    ("--mainconf", &["--mainconf", "-mainconf", "-mc"]),
    ("--release", &["--release", "-release", "-r"]),
    ("--list-methods", &["--list-methods", "-listmethods", "-list-methods"]),
    ("--android", &["--android", "-android"]),
    ("--bootstrap", &["--bootstrap", "-bootstrap", "-bs"]),
    ("--smoketest", &["--smoketest", "-smoketest"]),
    ("--method", &["--method", "-method", "-m"]),
    ("--clean", &["--clean", "-clean", "-c"]),
    ("--verbose", &["--verbose", "-verbose", "-v"]),
    ("--dump-cmd", &["--dump-cmd", "-dump-cmd", "-dumpcmd"]),
    ("--jobs", &["--jobs", "-jobs", "-j"]),
    ("--repo-root", &["--repo-root", "-reporoot", "-repo-root"]),
];

/// Options whose value may be glued onto a short alias
const GLUED: &[(&str, &str)] = &[("-mc", "--mainconf"), ("-m", "--method"), ("-j", "--jobs")];

/// Options that take the following argument as their value
const TAKES_VALUE: &[&str] = &["--list-conf", "--mainconf", "--method", "--jobs", "--repo-root"];

/// Rewrite `args` (without the program name) into GNU long form
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut value_pending = false;

    for arg in args {
        if value_pending {
            value_pending = false;
            out.push(arg);
            continue;
        }
        if !arg.starts_with('-') || arg == "-" || arg == "--" {
            out.push(arg);
            continue;
        }

        let lower = arg.to_lowercase();
        if let Some(long) = canonical(&lower) {
            value_pending = TAKES_VALUE.contains(&long);
            out.push(long.to_string());
            continue;
        }

        if let Some((name, value)) = arg.split_once('=') {
            if let Some(long) = canonical(&name.to_lowercase()) {
                out.push(format!("{}={}", long, value));
                continue;
            }
        }

        if let Some((prefix, long)) = GLUED.iter().find(|(prefix, _)| lower.starts_with(prefix)) {
            out.push(long.to_string());
            out.push(arg[prefix.len()..].to_string());
            continue;
        }

        out.push(arg);
    }
    out
}

fn canonical(lower: &str) -> Option<&'static str> {
    SPELLINGS
        .iter()
        .find(|(_, spellings)| spellings.contains(&lower))
        .map(|(long, _)| *long)
}
