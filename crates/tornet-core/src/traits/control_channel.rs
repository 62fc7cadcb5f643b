// # Control Channel Trait
//
// Defines the interface to the Tor daemon's authenticated control port.
//
// ## Implementations
//
// - Tor control protocol over TCP: `tornet-control` crate
// - [`DisabledControlChannel`]: for runs where the control port must not be used

use async_trait::async_trait;

/// Trait for control channel implementations
///
/// Implementations may keep an authenticated session open between rotations;
/// `disconnect()` closes whatever is still held.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Whether the control channel can be used at all
    ///
    /// Evaluated at the point of use, before every rotation attempt.
    fn supports_control_channel(&self) -> bool;

    /// Ask the daemon for a new identity (`SIGNAL NEWNYM`)
    async fn new_identity(&self) -> Result<(), crate::Error>;

    /// Best-effort graceful disconnect used during teardown
    async fn disconnect(&self) -> Result<(), crate::Error>;
}

/// Control channel that is never available
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledControlChannel;

#[async_trait]
impl ControlChannel for DisabledControlChannel {
    fn supports_control_channel(&self) -> bool {
        false
    }

    async fn new_identity(&self) -> Result<(), crate::Error> {
        Err(crate::Error::control("Control channel disabled"))
    }

    async fn disconnect(&self) -> Result<(), crate::Error> {
        Ok(())
    }
}
