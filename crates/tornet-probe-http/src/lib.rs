// # HTTP IP Prober
//
// This crate provides the HTTP-based IpProber for tornet.
//
// ## Routes
//
// - **Tor**: the IP echo service is queried through the local SOCKS proxy
//   (`socks5h://`, so DNS is resolved by Tor as well)
// - **Direct**: the same service, queried without a proxy
//
// ## Failure Model
//
// Probing never fails loudly. Timeouts, connection errors, error statuses and
// empty bodies all come back as `None` with a warning, and the rotation engine
// decides what to do about it.

use tornet_core::config::{ProbeConfig, ProxyConfig};
use tornet_core::traits::UNKNOWN_COUNTRY;
use tornet_core::{Error, IpProber, Result, Route};

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between connectivity check attempts
const CONNECTIVITY_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The subset of the geolocation response we read
#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    country_name: Option<String>,
}

/// IP prober backed by an HTTP echo service
pub struct HttpIpProber {
    /// Echo service URL (plain-text IP body)
    ip_echo_url: String,

    /// Geolocation URL template with an `{ip}` placeholder
    geolocation_url: String,

    /// Connectivity check URL
    connectivity_url: String,

    /// Connectivity check attempts
    connectivity_attempts: u32,

    /// Client routed through the Tor SOCKS proxy
    tor_client: reqwest::Client,

    /// Client with no proxy
    direct_client: reqwest::Client,

    /// Client for geolocation lookups
    geo_client: reqwest::Client,

    /// Client for the connectivity check
    connectivity_client: reqwest::Client,
}

impl HttpIpProber {
    /// Create a new prober
    ///
    /// # Parameters
    ///
    /// - `proxy`: Tor SOCKS proxy location
    /// - `probe`: Probe URLs and timeouts
    ///
    /// # Errors
    ///
    /// Returns `Error::Http` if the proxy URL is invalid or a client cannot be built.
    pub fn new(proxy: &ProxyConfig, probe: &ProbeConfig) -> Result<Self> {
        let socks = reqwest::Proxy::all(proxy.socks_url())
            .map_err(|e| Error::http(format!("Invalid SOCKS proxy {}: {}", proxy.socks_url(), e)))?;

        let tor_client = reqwest::Client::builder()
            .proxy(socks)
            .timeout(Duration::from_secs(probe.tor_timeout_secs))
            .build()
            .map_err(|e| Error::http(format!("Failed to build Tor client: {}", e)))?;

        Ok(Self {
            ip_echo_url: probe.ip_echo_url.clone(),
            geolocation_url: probe.geolocation_url.clone(),
            connectivity_url: probe.connectivity_url.clone(),
            connectivity_attempts: probe.connectivity_attempts,
            tor_client,
            direct_client: plain_client(probe.direct_timeout_secs)?,
            geo_client: plain_client(probe.geolocation_timeout_secs)?,
            connectivity_client: plain_client(probe.connectivity_timeout_secs)?,
        })
    }

    /// Check that the network is reachable at all
    ///
    /// Tries the connectivity URL up to the configured number of times, one second
    /// apart. Any HTTP response counts as connectivity, whatever its status.
    pub async fn check_connectivity(&self) -> bool {
        for attempt in 1..=self.connectivity_attempts {
            match self.connectivity_client.get(&self.connectivity_url).send().await {
                Ok(_) => {
                    info!("Internet connection OK");
                    return true;
                }
                Err(e) => {
                    warn!(
                        "Connectivity check {}/{} failed: {}",
                        attempt, self.connectivity_attempts, e
                    );
                    if attempt < self.connectivity_attempts {
                        tokio::time::sleep(CONNECTIVITY_RETRY_DELAY).await;
                    }
                }
            }
        }
        false
    }

    fn client_for(&self, route: Route) -> &reqwest::Client {
        match route {
            Route::Tor => &self.tor_client,
            Route::Direct => &self.direct_client,
        }
    }

    /// Fetch the echo service once and return the trimmed body
    async fn fetch_ip(&self, route: Route) -> Result<String> {
        let response = self
            .client_for(route)
            .get(&self.ip_echo_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::probe(format!("Request via {} timed out", route))
                } else {
                    Error::probe(format!("Request via {} failed: {}", route, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::probe(format!("HTTP error: {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::probe(format!("Failed to read response: {}", e)))?;

        let ip = body.trim();
        if ip.is_empty() {
            return Err(Error::probe("Empty response from IP echo service"));
        }
        Ok(ip.to_string())
    }

    async fn fetch_country(&self, ip: &str) -> Result<Option<String>> {
        let url = self.geolocation_url.replace("{ip}", ip);
        let response = self
            .geo_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Geolocation request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!("Geolocation HTTP error: {}", response.status())));
        }

        let geo: GeoResponse = response
            .json()
            .await
            .map_err(|e| Error::http(format!("Invalid geolocation response: {}", e)))?;

        Ok(geo.country_name.filter(|country| !country.is_empty()))
    }
}

fn plain_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait::async_trait]
impl IpProber for HttpIpProber {
    async fn probe(&self, route: Route) -> Option<String> {
        match self.fetch_ip(route).await {
            Ok(ip) => {
                debug!("Probed IP via {}: {}", route, ip);
                Some(ip)
            }
            Err(e) => {
                warn!("Failed to get IP via {}: {}", route, e);
                None
            }
        }
    }

    async fn geolocate(&self, ip: &str) -> String {
        if ip.is_empty() {
            return UNKNOWN_COUNTRY.to_string();
        }

        match self.fetch_country(ip).await {
            Ok(Some(country)) => country,
            Ok(None) => UNKNOWN_COUNTRY.to_string(),
            Err(e) => {
                debug!("Could not geolocate {}: {}", ip, e);
                UNKNOWN_COUNTRY.to_string()
            }
        }
    }
}
