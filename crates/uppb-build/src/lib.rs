//! uppb build orchestration
//!
//! Turns a target name plus user options into one invocation of the `umk`
//! build driver, or builds `umk` itself from source:
//! - Build method discovery, auto-generated compiler profiles and ranking
//! - Mainconfig and flag selection
//! - Driver command assembly and execution
//! - Atomic replacement of output binaries
//! - Self-hosting bootstrap through MSVC, GCC/Clang or an external Makefile

pub mod bootstrap;
pub mod command;
pub mod context;
pub mod error;
pub mod install;
pub mod method;
pub mod os;
pub mod process;
pub mod registry;
pub mod selection;

// Re-export main types
pub use bootstrap::{BootstrapBuilder, BootstrapOptions, BootstrapReport};
pub use command::{BuildInvocation, OutputPlan, DRIVER_PACKAGE};
pub use context::BuildContext;
pub use error::{BuildError, BuildResult, EXIT_INSTALL, EXIT_USAGE};
pub use install::{ArtifactSwapper, FileOps, InstallOutcome, StdFileOps};
pub use method::BuildMethod;
pub use os::HostOs;
pub use registry::MethodRegistry;
pub use selection::{ConfMode, SelectionOptions, SelectionResult};
