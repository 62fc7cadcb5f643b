//! Linux: systemd

use crate::processes;
use crate::runner::{CommandRunner, dispatch, succeeds};
use async_trait::async_trait;
use std::sync::Arc;
use tornet_core::{Platform, Result, ServiceAction, ServiceController};

/// Unit name of the Tor service
const UNIT: &str = "tor";

/// Manages Tor through `systemctl`, via `sudo` unless already root
pub struct SystemdController {
    runner: Arc<dyn CommandRunner>,
    use_sudo: bool,
}

impl SystemdController {
    /// Create a controller; `sudo` is used when not running as root
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_sudo(runner, !crate::is_root())
    }

    /// Create a controller with an explicit `sudo` choice
    pub fn with_sudo(runner: Arc<dyn CommandRunner>, use_sudo: bool) -> Self {
        Self { runner, use_sudo }
    }

    async fn systemctl(&self, action: &str) -> Result<ServiceAction> {
        if self.use_sudo {
            dispatch(self.runner.as_ref(), "sudo", &["systemctl", action, UNIT]).await
        } else {
            dispatch(self.runner.as_ref(), "systemctl", &[action, UNIT]).await
        }
    }
}

#[async_trait]
impl ServiceController for SystemdController {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    async fn is_installed(&self) -> bool {
        succeeds(self.runner.as_ref(), "which", &["tor"]).await
    }

    async fn is_running(&self) -> bool {
        succeeds(self.runner.as_ref(), "pgrep", &["-x", "tor"]).await
    }

    async fn start(&self) -> Result<ServiceAction> {
        self.systemctl("start").await
    }

    async fn stop(&self) -> Result<ServiceAction> {
        self.systemctl("stop").await
    }

    async fn reload(&self) -> Result<ServiceAction> {
        self.systemctl("reload").await
    }

    async fn terminate_stray_processes(&self) -> Result<usize> {
        processes::terminate_others(self.runner.as_ref()).await
    }
}
