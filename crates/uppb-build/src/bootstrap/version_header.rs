//! `build_info.h` generation
//!
//! Embeds the build timestamp, host, user and, when `git` answers, the
//! revision count, hash and branch of the checkout.

use crate::context::BuildContext;
use crate::error::{BuildError, BuildResult};
use crate::process::{capture_line, ToolCommand};
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the generated header
pub const HEADER_NAME: &str = "build_info.h";

/// Source-control revision metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitInfo {
    pub rev_count: String,
    pub hash: String,
    pub branch: String,
}

/// Identity of one bootstrap build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub time: NaiveDateTime,
    pub machine: String,
    pub user: String,
    pub git: Option<GitInfo>,
}

impl BuildInfo {
    /// Gather identity for a build of the repository in `ctx`
    pub fn collect(ctx: &BuildContext) -> Self {
        let user = ["USER", "USERNAME"]
            .iter()
            .filter_map(|key| ctx.env_var(key))
            .find(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(whoami::username);

        Self {
            time: Local::now().naive_local(),
            machine: whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string()),
            user,
            git: git_info(ctx),
        }
    }

    /// Header text
    pub fn render(&self) -> String {
        let t = &self.time;
        let mut lines = vec![
            format!("#define bmYEAR    {}", t.year() % 100),
            format!("#define bmMONTH   {}", t.month()),
            format!("#define bmDAY     {}", t.day()),
            format!("#define bmHOUR    {}", t.hour()),
            format!("#define bmMINUTE  {}", t.minute()),
            format!("#define bmSECOND  {}", t.second()),
            format!(
                "#define bmTIME    Time({}, {}, {}, {}, {}, {})",
                t.year(),
                t.month(),
                t.day(),
                t.hour(),
                t.minute(),
                t.second()
            ),
            format!("#define bmMACHINE \"{}\"", escape(&self.machine)),
            format!("#define bmUSER    \"{}\"", escape(&self.user)),
        ];
        if let Some(git) = &self.git {
            lines.push(format!("#define bmGIT_REVCOUNT \"{}\"", escape(&git.rev_count)));
            lines.push(format!("#define bmGIT_HASH \"{}\"", escape(&git.hash)));
            lines.push(format!("#define bmGIT_BRANCH \"{}\"", escape(&git.branch)));
        }
        lines.push(String::new());
        lines.join("\n")
    }

    /// Write `build_info.h` into `dir`
    pub fn write(&self, dir: &Path) -> BuildResult<PathBuf> {
        let path = dir.join(HEADER_NAME);
        fs::write(&path, self.render()).map_err(|e| BuildError::io(&path, e))?;
        Ok(path)
    }
}

/// Revision metadata; `None` when git is missing or this is not a checkout
fn git_info(ctx: &BuildContext) -> Option<GitInfo> {
    let git = |args: &[&str]| {
        capture_line(
            ctx,
            &ToolCommand::new("git")
                .args(args)
                .current_dir(ctx.repo_root()),
        )
    };

    let info = GitInfo {
        hash: git(&["rev-parse", "HEAD"])?,
        rev_count: git(&["rev-list", "--count", "HEAD"])?,
        branch: git(&["rev-parse", "--abbrev-ref", "HEAD"])?,
    };
    debug!(hash = %info.hash, "git revision");
    Some(info)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
