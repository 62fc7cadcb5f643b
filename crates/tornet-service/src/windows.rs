//! Windows: Tor Browser or a manually started tor.exe
//!
//! Nothing here is automatable. Every action returns guidance for the user,
//! and the running check is optimistic.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tornet_core::{Platform, Result, ServiceAction, ServiceController};
use tracing::debug;

const DEFAULT_PROGRAM_FILES: &str = "C:\\Program Files";

/// Reports manual steps instead of running service commands
#[derive(Debug, Clone)]
pub struct WindowsController {
    program_files: PathBuf,
}

impl WindowsController {
    /// Look for Tor under `%PROGRAMFILES%`
    pub fn new() -> Self {
        let program_files = std::env::var_os("PROGRAMFILES")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM_FILES));
        Self::with_program_files(program_files)
    }

    /// Look for Tor under a specific Program Files directory
    pub fn with_program_files(program_files: impl Into<PathBuf>) -> Self {
        Self {
            program_files: program_files.into(),
        }
    }

    /// Known tor.exe locations: Tor Browser, then a standalone install
    pub fn candidate_paths(&self) -> [PathBuf; 2] {
        let base: &Path = &self.program_files;
        [
            base.join("Tor Browser")
                .join("Browser")
                .join("TorBrowser")
                .join("Tor")
                .join("tor.exe"),
            base.join("Tor").join("tor.exe"),
        ]
    }
}

impl Default for WindowsController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceController for WindowsController {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    async fn is_installed(&self) -> bool {
        for path in self.candidate_paths() {
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!("Found Tor at {}", path.display());
                return true;
            }
        }
        debug!("Tor executable not found in common Windows paths");
        false
    }

    async fn is_running(&self) -> bool {
        // No reliable process check; assume the user started Tor as instructed
        true
    }

    async fn start(&self) -> Result<ServiceAction> {
        Ok(ServiceAction::manual(
            "On Windows, please ensure Tor is running, e.g., via Tor Browser, or by starting 'tor.exe' manually.",
        ))
    }

    async fn stop(&self) -> Result<ServiceAction> {
        Ok(ServiceAction::manual(
            "On Windows, please close Tor Browser or stop 'tor.exe' manually.",
        ))
    }

    async fn reload(&self) -> Result<ServiceAction> {
        Ok(ServiceAction::manual(
            "On Windows, restart Tor Browser or 'tor.exe' manually to get a new circuit.",
        ))
    }
}
