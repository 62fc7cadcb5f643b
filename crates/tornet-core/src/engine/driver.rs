//! Circuit rotation driver
//!
//! Issues a rotation request using one of two strategies:
//!
//! 1. **ControlSignal**: `SIGNAL NEWNYM` over the authenticated control port
//! 2. **ServiceReload**: reload/restart of the Tor service through the OS
//!
//! Every call prefers the control signal and falls back to a reload within the
//! same call. With `sticky_fallback` the first control failure disables the
//! control path for the lifetime of the driver.
//!
//! A successful `rotate()` means a command was issued, not that the IP changed.

use crate::traits::{ControlChannel, ServiceAction, ServiceController};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Mechanism used for one rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    /// NEWNYM over the control port
    ControlSignal,
    /// Service-manager reload/restart
    ServiceReload,
}

impl fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationStrategy::ControlSignal => f.write_str("control signal"),
            RotationStrategy::ServiceReload => f.write_str("service reload"),
        }
    }
}

/// What happened during one `rotate()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    /// Strategy that produced the final outcome
    pub strategy: RotationStrategy,
    /// Whether a rotation command was issued
    pub issued: bool,
    /// Why the control signal was abandoned, if it was tried and failed
    pub downgrade_reason: Option<String>,
    /// Manual-action guidance when the platform has no automatable reload
    pub guidance: Option<String>,
}

/// Rotates Tor circuits, preferring the control channel
pub struct CircuitRotationDriver {
    control: Arc<dyn ControlChannel>,
    service: Arc<dyn ServiceController>,
    sticky_fallback: bool,
    control_suspended: AtomicBool,
}

impl CircuitRotationDriver {
    /// Create a new driver
    ///
    /// # Parameters
    ///
    /// - `control`: Control channel implementation
    /// - `service`: Service controller for the detected platform
    /// - `sticky_fallback`: Stop using the control channel after its first failure
    pub fn new(
        control: Arc<dyn ControlChannel>,
        service: Arc<dyn ServiceController>,
        sticky_fallback: bool,
    ) -> Self {
        Self {
            control,
            service,
            sticky_fallback,
            control_suspended: AtomicBool::new(false),
        }
    }

    /// The control channel this driver signals
    pub fn control(&self) -> &Arc<dyn ControlChannel> {
        &self.control
    }

    /// The service controller this driver falls back to
    pub fn service(&self) -> &Arc<dyn ServiceController> {
        &self.service
    }

    /// Whether the control path was disabled by a sticky fallback
    pub fn control_suspended(&self) -> bool {
        self.control_suspended.load(Ordering::SeqCst)
    }

    /// Issue one rotation; `true` when a command was issued
    pub async fn rotate(&self) -> bool {
        self.rotate_with_report().await.issued
    }

    /// Issue one rotation and describe how it went
    pub async fn rotate_with_report(&self) -> Rotation {
        let mut downgrade_reason = None;

        if self.control.supports_control_channel() && !self.control_suspended() {
            debug!("Attempting IP change via Tor control port");
            match self.control.new_identity().await {
                Ok(()) => {
                    info!("Sent NEWNYM signal to Tor for a new circuit");
                    return Rotation {
                        strategy: RotationStrategy::ControlSignal,
                        issued: true,
                        downgrade_reason: None,
                        guidance: None,
                    };
                }
                Err(e) => {
                    warn!(
                        "Failed to send NEWNYM signal via Tor control port: {}. Falling back to service reload",
                        e
                    );
                    if self.sticky_fallback {
                        info!("Control channel disabled for the rest of this run");
                        self.control_suspended.store(true, Ordering::SeqCst);
                    }
                    downgrade_reason = Some(e.to_string());
                }
            }
        } else {
            debug!("Control channel unavailable, using service reload");
        }

        let (issued, guidance) = match self.service.reload().await {
            Ok(ServiceAction::Dispatched) => {
                info!("Reloaded Tor service on {}", self.service.platform());
                (true, None)
            }
            Ok(ServiceAction::Manual { guidance }) => {
                warn!("{}", guidance);
                (false, Some(guidance))
            }
            Err(e) => {
                error!("Failed to reload Tor service: {}", e);
                (false, None)
            }
        };

        Rotation {
            strategy: RotationStrategy::ServiceReload,
            issued,
            downgrade_reason,
            guidance,
        }
    }
}
