//! Verified rotation with bounded retries

use super::{EngineEvent, RotationAttempt, RotationEngine};
use super::AttemptFailure;
use crate::traits::Route;
use std::time::Duration;
use tracing::{debug, error, info, warn};

impl RotationEngine {
    /// Change the IP using the configured retry policy
    ///
    /// See [`RotationEngine::change_ip_with()`].
    pub async fn change_ip(&self) -> Option<String> {
        self.change_ip_with(self.rotation.max_retries, self.rotation.settle())
            .await
    }

    /// Rotate the circuit until the probed IP changes
    ///
    /// # Algorithm
    ///
    /// 1. Probe a baseline through Tor (a failed baseline does not abort)
    /// 2. For each attempt: rotate, wait `settle`, probe again
    /// 3. Return the first IP that is non-empty and differs from the last one observed
    ///
    /// # Returns
    ///
    /// - `Some(ip)`: The new IP
    /// - `None`: No change after `max_retries` attempts, or cancelled
    pub async fn change_ip_with(&self, max_retries: u32, settle: Duration) -> Option<String> {
        debug!("Attempting to change IP");

        let mut previous = self.unless_cancelled(self.probe_tor()).await?;
        if previous.is_none() {
            warn!("Could not get current Tor IP. Proceeding without a baseline");
            self.emit_event(EngineEvent::BaselineUnavailable);
        }

        for attempt_number in 1..=max_retries {
            if self.cancel.is_cancelled() {
                return None;
            }

            info!("IP change attempt {}/{}", attempt_number, max_retries);
            self.emit_event(EngineEvent::AttemptStarted {
                attempt: attempt_number,
                max_attempts: max_retries,
            });

            let Some(rotation) = self.unless_cancelled(self.driver.rotate_with_report()).await
            else {
                debug!("Cancelled while rotating");
                return None;
            };
            if let Some(reason) = rotation.downgrade_reason {
                self.emit_event(EngineEvent::StrategyDowngraded { reason });
            }
            if let Some(guidance) = rotation.guidance {
                self.emit_event(EngineEvent::ManualActionRequired { guidance });
            }
            self.emit_event(EngineEvent::RotationIssued {
                strategy: rotation.strategy,
                issued: rotation.issued,
            });

            // Fixed pause: circuit build time is roughly constant
            if !self.pause(settle).await {
                debug!("Cancelled while waiting for the new circuit");
                return None;
            }

            let candidate = self.unless_cancelled(self.probe_tor()).await?;
            let attempt = RotationAttempt::evaluate(
                attempt_number,
                max_retries,
                previous.clone(),
                candidate.clone(),
            );
            self.emit_event(EngineEvent::AttemptFinished(attempt.clone()));

            match attempt.failure() {
                None => {
                    let ip = attempt.resulting_ip.unwrap_or_default();
                    info!("Successfully changed IP to {}", ip);
                    self.emit_event(EngineEvent::IpChanged {
                        ip: ip.clone(),
                        previous_ip: attempt.previous_ip,
                        attempts: attempt_number,
                    });
                    return Some(ip);
                }
                Some(AttemptFailure::Unchanged) => {
                    warn!("IP address did not change on attempt {}. Retrying", attempt_number);
                }
                Some(AttemptFailure::NoNewIp) => {
                    warn!("Failed to obtain new IP on attempt {}. Retrying", attempt_number);
                }
            }

            if candidate.is_some() {
                previous = candidate;
            }
        }

        error!("Failed to change IP after {} attempts", max_retries);
        self.emit_event(EngineEvent::CycleFailed {
            attempts: max_retries,
        });
        None
    }

    async fn probe_tor(&self) -> Option<String> {
        self.prober
            .probe(Route::Tor)
            .await
            .filter(|ip| !ip.is_empty())
    }
}
