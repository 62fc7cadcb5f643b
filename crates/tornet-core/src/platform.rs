//! Host platform detection
//!
//! The service controller is chosen once from [`Platform::detect()`]; nothing
//! else in the workspace branches on the operating system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating systems tornet knows how to manage Tor on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux with systemd
    Linux,
    /// macOS with Homebrew services
    MacOs,
    /// Windows (Tor Browser or a manually started tor.exe)
    Windows,
    /// Anything else
    Unknown,
}

impl Platform {
    /// Detect the platform this binary was built for
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an `std::env::consts::OS` value to a platform
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Unknown,
        }
    }

    /// Human-readable platform name
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::MacOs => "macOS",
            Platform::Windows => "Windows",
            Platform::Unknown => "Unknown",
        }
    }

    /// Guidance printed when Tor is not installed
    pub fn install_hint(&self) -> &'static str {
        match self {
            Platform::Linux => "Install Tor with your package manager, e.g. `sudo apt install tor`",
            Platform::MacOs => "Install Tor with Homebrew: `brew install tor`",
            Platform::Windows => "Download and install Tor Browser from https://www.torproject.org",
            Platform::Unknown => "Install Tor from https://www.torproject.org and make sure it is running",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
