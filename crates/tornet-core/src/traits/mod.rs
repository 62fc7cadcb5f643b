//! Core traits for tornet
//!
//! This module defines the abstract interfaces the rotation engine calls into.
//!
//! - [`IpProber`]: Read the externally visible IP address
//! - [`ControlChannel`]: Signal the Tor daemon over its control port
//! - [`ServiceController`]: Manage the Tor service through the OS

pub mod ip_prober;
pub mod control_channel;
pub mod service_controller;

pub use ip_prober::{IpProber, Route, UNKNOWN_COUNTRY};
pub use control_channel::{ControlChannel, DisabledControlChannel};
pub use service_controller::{ServiceAction, ServiceController};
