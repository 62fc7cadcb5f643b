// # Lifecycle
//
// Owns the shutdown phase of a run.
//
// ## Flow
//
// 1. The binary turns SIGINT/SIGQUIT into a future and hands it to
//    [`Lifecycle::supervise()`]
// 2. When it resolves, the cancellation token is cancelled; the engine notices at
//    its current suspension point and returns without starting another cycle
// 3. [`Lifecycle::teardown()`] then runs exactly once: control-port disconnect,
//    service stop, stray process termination
//
// The signal path only cancels a token. It never calls back into the scheduling
// loop.

use crate::engine::{CircuitRotationDriver, RotationEngine, RunSummary};
use crate::config::ScheduleConfig;
use crate::error::Result;
use crate::traits::{ControlChannel, ServiceAction, ServiceController};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound for each teardown step, so a hung service manager cannot block exit
pub const TEARDOWN_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// How a supervised run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The schedule ran to completion
    Completed(RunSummary),
    /// A shutdown request stopped the run and teardown was performed
    Interrupted(RunSummary),
}

impl RunOutcome {
    /// Summary of the run, however it ended
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Interrupted(summary) => summary,
        }
    }
}

/// Shutdown coordinator
pub struct Lifecycle {
    control: Arc<dyn ControlChannel>,
    service: Arc<dyn ServiceController>,
    cancel: CancellationToken,
    torn_down: AtomicBool,
}

impl Lifecycle {
    /// Create a lifecycle for the given control channel and service controller
    pub fn new(control: Arc<dyn ControlChannel>, service: Arc<dyn ServiceController>) -> Self {
        Self {
            control,
            service,
            cancel: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Create a lifecycle sharing the driver's control channel and service controller
    pub fn for_driver(driver: &CircuitRotationDriver) -> Self {
        Self::new(driver.control().clone(), driver.service().clone())
    }

    /// Token to hand to the [`RotationEngine`]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask everything observing the token to stop
    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    /// Resolves once shutdown has been requested
    pub async fn shutdown_requested(&self) {
        self.cancel.cancelled().await
    }

    /// Await `work` unless shutdown is requested first
    ///
    /// Used for startup steps that run before [`Lifecycle::supervise()`].
    pub async fn unless_shutdown<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = work => Some(output),
        }
    }

    /// Whether teardown has already run
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Run the schedule until it completes or `shutdown` resolves
    ///
    /// On shutdown the engine is cancelled, allowed to unwind, and teardown runs
    /// once. A schedule that completes on its own leaves Tor running.
    ///
    /// # Parameters
    ///
    /// - `engine`: Engine built with this lifecycle's cancellation token
    /// - `schedule`: Schedule to run
    /// - `shutdown`: Future that resolves when the process should stop
    pub async fn supervise<F>(
        &self,
        engine: &RotationEngine,
        schedule: ScheduleConfig,
        shutdown: F,
    ) -> Result<RunOutcome>
    where
        F: Future<Output = ()>,
    {
        let run = engine.run(schedule);
        tokio::pin!(run);
        tokio::pin!(shutdown);

        tokio::select! {
            result = &mut run => return self.finish(result?).await,
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                self.request_shutdown();
            }
        }

        let summary = run.await?;
        self.finish(summary).await
    }

    async fn finish(&self, summary: RunSummary) -> Result<RunOutcome> {
        if summary.cancelled {
            self.teardown().await;
            Ok(RunOutcome::Interrupted(summary))
        } else {
            Ok(RunOutcome::Completed(summary))
        }
    }

    /// Stop Tor and stray tornet processes
    ///
    /// Best-effort throughout: failures are logged, never returned. Only the first
    /// call does any work.
    ///
    /// # Returns
    ///
    /// `true` if this call performed the teardown, `false` if it had already run
    pub async fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            debug!("Teardown already performed");
            return false;
        }
        self.cancel.cancel();

        debug!("Stopping services");
        if self.control.supports_control_channel() {
            match timeout(TEARDOWN_STEP_TIMEOUT, self.control.disconnect()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Could not reach Tor control port for graceful shutdown: {}", e)
                }
                Err(_) => warn!("Control port disconnect timed out"),
            }
        }

        match timeout(TEARDOWN_STEP_TIMEOUT, self.service.stop()).await {
            Ok(Ok(ServiceAction::Dispatched)) => {
                info!("Stopped Tor service on {}", self.service.platform());
            }
            Ok(Ok(ServiceAction::Manual { guidance })) => warn!("{}", guidance),
            Ok(Err(e)) => error!("Failed to stop Tor service: {}", e),
            Err(_) => error!(
                "Stopping the Tor service timed out after {:?}",
                TEARDOWN_STEP_TIMEOUT
            ),
        }

        match timeout(TEARDOWN_STEP_TIMEOUT, self.service.terminate_stray_processes()).await {
            Ok(Ok(0)) => debug!("No stray tornet processes"),
            Ok(Ok(count)) => info!("Terminated {} stray tornet process(es)", count),
            Ok(Err(e)) => warn!("Failed to terminate stray tornet processes: {}", e),
            Err(_) => warn!(
                "Terminating stray tornet processes timed out after {:?}",
                TEARDOWN_STEP_TIMEOUT
            ),
        }

        true
    }
}
