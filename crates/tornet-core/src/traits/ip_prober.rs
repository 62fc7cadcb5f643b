// # IP Prober Trait
//
// Defines the interface for reading the externally visible IP address.
//
// ## Implementations
//
// - HTTP IP-echo service through SOCKS or directly: `tornet-probe-http` crate
//
// ## Usage
//
// ```rust,ignore
// use tornet_core::{IpProber, Route};
//
// async fn show(prober: &dyn IpProber) {
//     match prober.probe(Route::Tor).await {
//         Some(ip) => println!("{} ({})", ip, prober.geolocate(&ip).await),
//         None => println!("Tor is not answering yet"),
//     }
// }
// ```

use async_trait::async_trait;
use std::fmt;

/// Country reported when geolocation fails
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// Network path used for an IP lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Through the local Tor SOCKS proxy
    Tor,
    /// Straight from this host
    Direct,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Tor => f.write_str("tor"),
            Route::Direct => f.write_str("direct"),
        }
    }
}

/// Trait for IP prober implementations
///
/// # Contract
///
/// - Network errors, timeouts and empty answers yield `None`, never an error
/// - No retries at this layer; the rotation engine owns retry policy
/// - No side effects beyond the outbound request
///
/// Addresses are opaque strings and are compared by equality only.
#[async_trait]
pub trait IpProber: Send + Sync {
    /// Fetch the current IP address over the given route
    async fn probe(&self, route: Route) -> Option<String>;

    /// Best-effort country lookup for an address
    ///
    /// Failures degrade to [`UNKNOWN_COUNTRY`].
    async fn geolocate(&self, _ip: &str) -> String {
        UNKNOWN_COUNTRY.to_string()
    }
}
