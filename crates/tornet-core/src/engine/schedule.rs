//! Scheduling loop

use super::{EngineEvent, RotationEngine};
use crate::config::ScheduleConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// What a scheduling run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Schedule the run used
    pub schedule: ScheduleConfig,
    /// Number of `change_ip` invocations
    pub cycles: u32,
    /// Cycles that produced a new IP
    pub succeeded: u32,
    /// Cycles that exhausted their attempts
    pub failed: u32,
    /// Whether the run was stopped by cancellation
    pub cancelled: bool,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run stopped
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    fn new(schedule: ScheduleConfig) -> Self {
        let now = Utc::now();
        Self {
            schedule,
            cycles: 0,
            succeeded: 0,
            failed: 0,
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }
}

impl RotationEngine {
    /// Run verified rotations on a fixed schedule
    ///
    /// Each cycle waits `interval_secs`, then calls [`RotationEngine::change_ip()`].
    /// Failed cycles are reported and the loop moves on. With `repeat_count == 0`
    /// the loop runs until the cancellation token fires; otherwise it runs exactly
    /// `repeat_count` cycles.
    ///
    /// # Returns
    ///
    /// - `Ok(RunSummary)`: Loop finished or was cancelled
    /// - `Err(Error)`: Invalid schedule
    pub async fn run(&self, schedule: ScheduleConfig) -> Result<RunSummary> {
        schedule.validate()?;

        let mut summary = RunSummary::new(schedule);
        self.emit_event(EngineEvent::Started {
            interval_secs: schedule.interval_secs,
            repeat_count: schedule.repeat_count,
        });

        while schedule.is_infinite() || summary.cycles < schedule.repeat_count {
            let cycle = summary.cycles + 1;
            if schedule.is_infinite() {
                info!("Waiting {} seconds before changing IP", schedule.interval_secs);
            } else {
                info!(
                    "Waiting {} seconds before changing IP ({}/{})",
                    schedule.interval_secs, cycle, schedule.repeat_count
                );
            }
            self.emit_event(EngineEvent::CycleScheduled {
                cycle,
                repeat_count: schedule.repeat_count,
                wait_secs: schedule.interval_secs,
            });

            if !self.pause(schedule.interval()).await {
                break;
            }

            summary.cycles = cycle;
            match self.change_ip().await {
                Some(ip) => {
                    summary.succeeded += 1;
                    self.report_identity(ip).await;
                }
                None if self.cancel.is_cancelled() => break,
                None => {
                    summary.failed += 1;
                    warn!("Cycle {} ended without a new IP", cycle);
                }
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        summary.finished_at = Utc::now();

        let reason = if summary.cancelled {
            "Shutdown requested"
        } else {
            "Schedule complete"
        };
        info!(
            "Rotation loop stopped: {} ({} cycles, {} changed, {} failed)",
            reason, summary.cycles, summary.succeeded, summary.failed
        );
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });

        Ok(summary)
    }

    async fn report_identity(&self, ip: String) {
        let country = if self.geolocate {
            self.unless_cancelled(self.prober.geolocate(&ip)).await
        } else {
            None
        };

        match &country {
            Some(country) => info!("Your IP has been changed to {} ({})", ip, country),
            None => info!("Your IP has been changed to {}", ip),
        }

        self.emit_event(EngineEvent::IdentityReported {
            ip,
            country,
            at: Utc::now(),
        });
    }
}
