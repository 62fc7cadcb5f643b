//! Core rotation engine
//!
//! The RotationEngine is responsible for:
//! - Verified rotation: rotate, settle, re-probe, compare, with bounded retries
//! - The scheduling loop that repeats verified rotations at a fixed interval
//! - Reporting progress as [`EngineEvent`]s
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ run()        │── every interval ──┐
//! └──────────────┘                    │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │ change_ip()  │
//!                            └──────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌──────────────┐           ┌──────────────┐           ┌─────────────┐
//! │ Rotation     │           │ IpProber     │           │   Events    │
//! │ Driver       │           │ (re-probe)   │           │  (notify)   │
//! └──────────────┘           └──────────────┘           └─────────────┘
//! ```
//!
//! ## Cancellation
//!
//! Every suspension point (interval sleep, settle sleep, probes) is raced
//! against the engine's [`CancellationToken`]. Cancelling it makes the current
//! call return promptly without starting another cycle.

mod driver;
mod schedule;
mod verify;

pub use driver::{CircuitRotationDriver, Rotation, RotationStrategy};
pub use schedule::RunSummary;

use crate::config::{RotationConfig, TornetConfig};
use crate::error::Result;
use crate::traits::{IpProber, Route};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One rotate+probe iteration inside a rotation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationAttempt {
    /// 1-based attempt number
    pub attempt_number: u32,
    /// Attempt limit for this request
    pub max_attempts: u32,
    /// Last IP observed before this attempt
    pub previous_ip: Option<String>,
    /// IP observed after this attempt
    pub resulting_ip: Option<String>,
    /// Whether the resulting IP is present and differs from the previous one
    pub succeeded: bool,
}

/// Why an attempt did not produce a new IP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The probe after rotation returned nothing
    NoNewIp,
    /// The probe returned the same IP as before
    Unchanged,
}

impl RotationAttempt {
    /// Evaluate an attempt from the IPs observed around it
    pub fn evaluate(
        attempt_number: u32,
        max_attempts: u32,
        previous_ip: Option<String>,
        resulting_ip: Option<String>,
    ) -> Self {
        let succeeded = match &resulting_ip {
            Some(ip) => !ip.is_empty() && previous_ip.as_ref() != Some(ip),
            None => false,
        };

        Self {
            attempt_number,
            max_attempts,
            previous_ip,
            resulting_ip,
            succeeded,
        }
    }

    /// Failure kind, if the attempt failed
    pub fn failure(&self) -> Option<AttemptFailure> {
        if self.succeeded {
            return None;
        }
        match &self.resulting_ip {
            Some(ip) if !ip.is_empty() => Some(AttemptFailure::Unchanged),
            _ => Some(AttemptFailure::NoNewIp),
        }
    }
}

/// Events emitted by the RotationEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Scheduling loop started
    Started {
        interval_secs: u64,
        repeat_count: u32,
    },

    /// Waiting before the next cycle (`repeat_count` is 0 when unbounded)
    CycleScheduled {
        cycle: u32,
        repeat_count: u32,
        wait_secs: u64,
    },

    /// The baseline probe failed; the cycle proceeds without one
    BaselineUnavailable,

    /// Rotation attempt started
    AttemptStarted {
        attempt: u32,
        max_attempts: u32,
    },

    /// The control signal failed and the driver fell back to a reload
    StrategyDowngraded {
        reason: String,
    },

    /// Rotation command outcome
    RotationIssued {
        strategy: RotationStrategy,
        issued: bool,
    },

    /// The platform needs the user to act
    ManualActionRequired {
        guidance: String,
    },

    /// Attempt finished (successfully or not)
    AttemptFinished(RotationAttempt),

    /// Verified IP change
    IpChanged {
        ip: String,
        previous_ip: Option<String>,
        attempts: u32,
    },

    /// No IP change after exhausting all attempts
    CycleFailed {
        attempts: u32,
    },

    /// New identity reported to the user
    IdentityReported {
        ip: String,
        country: Option<String>,
        at: DateTime<Utc>,
    },

    /// Scheduling loop stopped
    Stopped {
        reason: String,
    },
}

/// Core rotation engine
///
/// ## Lifecycle
///
/// 1. Create with [`RotationEngine::new()`]
/// 2. Drive single rotations with [`RotationEngine::change_ip()`] or a schedule with
///    [`RotationEngine::run()`]
/// 3. Cancel the token passed at construction to stop at the next suspension point
///
/// ## Threading
///
/// All work is sequential; the engine never spawns tasks.
pub struct RotationEngine {
    /// IP prober for baseline and verification probes
    prober: Arc<dyn IpProber>,

    /// Rotation driver (control signal with reload fallback)
    driver: CircuitRotationDriver,

    /// Retry policy
    rotation: RotationConfig,

    /// Look up the country of each new IP
    geolocate: bool,

    /// Cancellation observed at every suspension point
    cancel: CancellationToken,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl RotationEngine {
    /// Create a new rotation engine
    ///
    /// # Parameters
    ///
    /// - `prober`: IP prober implementation
    /// - `driver`: Circuit rotation driver
    /// - `config`: tornet configuration
    /// - `cancel`: Token that stops the engine at its next suspension point
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        prober: Arc<dyn IpProber>,
        driver: CircuitRotationDriver,
        config: &TornetConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.rotation.event_channel_capacity);

        let engine = Self {
            prober,
            driver,
            rotation: config.rotation.clone(),
            geolocate: config.probe.geolocate,
            cancel,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The rotation driver
    pub fn driver(&self) -> &CircuitRotationDriver {
        &self.driver
    }

    /// The token this engine observes
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current IP: through Tor when the service is running, otherwise directly
    pub async fn current_ip(&self) -> Option<String> {
        let route = if self.driver.service().is_running().await {
            Route::Tor
        } else {
            debug!("Tor not detected as running, fetching direct IP");
            Route::Direct
        };
        self.prober.probe(route).await
    }

    /// Best-effort country for an IP
    pub async fn geolocate(&self, ip: &str) -> String {
        self.prober.geolocate(ip).await
    }

    /// Sleep unless cancelled first; `false` when cancelled
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Await a future unless cancelled first
    async fn unless_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = fut => Some(output),
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening; events are optional
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
