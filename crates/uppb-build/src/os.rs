//! Host operating system classification

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Windows,
    Linux,
    MacOs,
    FreeBsd,
    /// Any other POSIX system
    OtherPosix,
}

impl HostOs {
    /// The OS this binary was compiled for
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "freebsd") {
            Self::FreeBsd
        } else {
            Self::OtherPosix
        }
    }

    pub fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }

    pub fn is_freebsd(self) -> bool {
        matches!(self, Self::FreeBsd)
    }

    /// Suffix appended to executable names
    pub fn exe_suffix(self) -> &'static str {
        if self.is_windows() {
            ".exe"
        } else {
            ""
        }
    }

    /// File name of an executable called `stem`
    pub fn exe_name(self, stem: &str) -> String {
        format!("{}{}", stem, self.exe_suffix())
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::FreeBsd => write!(f, "freebsd"),
            Self::OtherPosix => write!(f, "posix"),
        }
    }
}
