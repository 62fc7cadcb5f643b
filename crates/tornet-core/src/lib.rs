// # tornet-core
//
// Core library for verified Tor circuit rotation.
//
// ## Architecture Overview
//
// This library owns the rotation control loop and the seams it calls into:
// - **IpProber**: Trait for reading the externally visible IP (through Tor or directly)
// - **ControlChannel**: Trait for the daemon's authenticated control port
// - **ServiceController**: Trait for per-platform service management
// - **CircuitRotationDriver**: Control-signal rotation with service-reload fallback
// - **RotationEngine**: Rotate, settle, re-probe, compare, with bounded retries and a schedule
// - **Lifecycle**: Cancellation and a run-once teardown phase
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from HTTP, control-port and OS code
// 2. **Sequential**: One activity at a time; suspension points observe a cancellation token
// 3. **Non-fatal steady state**: Probe, rotation and cycle failures never escape the loop
// 4. **Library-First**: Everything the binary does can be driven from a test harness

pub mod traits;
pub mod engine;
pub mod lifecycle;
pub mod config;
pub mod error;
pub mod platform;

// Re-export core types for convenience
pub use traits::{ControlChannel, IpProber, Route, ServiceAction, ServiceController};
pub use engine::{
    AttemptFailure, CircuitRotationDriver, EngineEvent, Rotation, RotationAttempt, RotationEngine,
    RotationStrategy, RunSummary,
};
pub use lifecycle::{Lifecycle, RunOutcome};
pub use config::{
    ControlAuth, ControlConfig, LoggingConfig, RotationConfig, ScheduleConfig, TornetConfig,
};
pub use error::{Error, Result};
pub use platform::Platform;
