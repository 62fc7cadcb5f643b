// # Tor Service Controllers
//
// This crate provides the per-platform ServiceController implementations.
//
// | Platform | start / stop            | reload                    | running check  |
// |----------|-------------------------|---------------------------|----------------|
// | Linux    | `systemctl start/stop`  | `systemctl reload tor`    | `pgrep -x tor` |
// | macOS    | `brew services ...`     | `brew services restart`   | `pgrep -x tor` |
// | Windows  | manual guidance         | manual guidance           | assumed        |
// | other    | unsupported             | unsupported               | `false`        |
//
// All process spawning goes through a `CommandRunner`.

mod homebrew;
mod processes;
mod runner;
mod systemd;
mod windows;

pub use homebrew::HomebrewController;
pub use processes::PROCESS_NAME;
pub use runner::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use systemd::SystemdController;
pub use windows::WindowsController;

use async_trait::async_trait;
use std::sync::Arc;
use tornet_core::{Error, Platform, Result, ServiceAction, ServiceController};

/// Controller for platforms tornet cannot manage
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedController {
    platform: Platform,
}

impl UnsupportedController {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn unsupported(&self) -> Error {
        Error::unsupported(self.platform.name(), self.platform.install_hint())
    }
}

#[async_trait]
impl ServiceController for UnsupportedController {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn is_installed(&self) -> bool {
        false
    }

    async fn is_running(&self) -> bool {
        false
    }

    async fn start(&self) -> Result<ServiceAction> {
        Err(self.unsupported())
    }

    async fn stop(&self) -> Result<ServiceAction> {
        Err(self.unsupported())
    }

    async fn reload(&self) -> Result<ServiceAction> {
        Err(self.unsupported())
    }
}

/// Select the controller for `platform`
pub fn controller_for(
    platform: Platform,
    runner: Arc<dyn CommandRunner>,
) -> Arc<dyn ServiceController> {
    match platform {
        Platform::Linux => Arc::new(SystemdController::new(runner)),
        Platform::MacOs => Arc::new(HomebrewController::new(runner)),
        Platform::Windows => Arc::new(WindowsController::new()),
        Platform::Unknown => Arc::new(UnsupportedController::new(platform)),
    }
}

/// Controller for the host platform, running real commands
pub fn detect() -> Arc<dyn ServiceController> {
    controller_for(Platform::detect(), Arc::new(SystemCommandRunner))
}

/// Whether the process runs with root privileges
#[cfg(unix)]
pub fn is_root() -> bool {
    // SAFETY: geteuid() has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Whether the process runs with root privileges
#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}
