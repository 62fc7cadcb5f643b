// # Service Controller Trait
//
// Defines the per-platform capability set {start, stop, reload, is_running,
// is_installed} for the Tor daemon.
//
// ## Implementations
//
// - systemd (Linux), Homebrew services (macOS), manual guidance (Windows and
//   unknown platforms): `tornet-service` crate
//
// One controller is selected at startup from the detected [`Platform`];
// callers never branch on the operating system themselves.
//
// [`Platform`]: crate::Platform

use async_trait::async_trait;

/// Outcome of a service action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    /// The service-manager command ran successfully
    Dispatched,
    /// No automatable path on this platform; the user has to act
    Manual {
        /// What the user should do
        guidance: String,
    },
}

impl ServiceAction {
    /// Create a manual-action outcome
    pub fn manual(guidance: impl Into<String>) -> Self {
        Self::Manual {
            guidance: guidance.into(),
        }
    }

    /// Whether a command was actually issued
    pub fn is_dispatched(&self) -> bool {
        matches!(self, ServiceAction::Dispatched)
    }
}

/// Trait for service controller implementations
#[async_trait]
pub trait ServiceController: Send + Sync {
    /// Platform this controller manages
    fn platform(&self) -> crate::Platform;

    /// Whether a Tor executable is installed
    async fn is_installed(&self) -> bool;

    /// Whether a Tor process is running
    async fn is_running(&self) -> bool;

    /// Start the Tor service
    async fn start(&self) -> Result<ServiceAction, crate::Error>;

    /// Stop the Tor service
    async fn stop(&self) -> Result<ServiceAction, crate::Error>;

    /// Reload or restart the Tor service so it builds fresh circuits
    async fn reload(&self) -> Result<ServiceAction, crate::Error>;

    /// Terminate other running instances of this tool
    ///
    /// Returns the number of processes signalled. Never targets the caller.
    async fn terminate_stray_processes(&self) -> Result<usize, crate::Error> {
        Ok(0)
    }
}
