//! macOS: Homebrew services

use crate::processes;
use crate::runner::{CommandRunner, dispatch, succeeds};
use async_trait::async_trait;
use std::sync::Arc;
use tornet_core::{Platform, Result, ServiceAction, ServiceController};

/// Manages Tor through `brew services`
///
/// Homebrew has no reload; a restart is what builds fresh circuits.
pub struct HomebrewController {
    runner: Arc<dyn CommandRunner>,
}

impl HomebrewController {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn services(&self, action: &str) -> Result<ServiceAction> {
        dispatch(self.runner.as_ref(), "brew", &["services", action, "tor"]).await
    }
}

#[async_trait]
impl ServiceController for HomebrewController {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    async fn is_installed(&self) -> bool {
        succeeds(self.runner.as_ref(), "which", &["tor"]).await
    }

    async fn is_running(&self) -> bool {
        succeeds(self.runner.as_ref(), "pgrep", &["-x", "tor"]).await
    }

    async fn start(&self) -> Result<ServiceAction> {
        self.services("start").await
    }

    async fn stop(&self) -> Result<ServiceAction> {
        self.services("stop").await
    }

    async fn reload(&self) -> Result<ServiceAction> {
        self.services("restart").await
    }

    async fn terminate_stray_processes(&self) -> Result<usize> {
        processes::terminate_others(self.runner.as_ref()).await
    }
}
