//! Configuration types for tornet
//!
//! This module defines all configuration structures used throughout the workspace.
//! Verbosity is an ordinary field here and is threaded to whoever needs it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main tornet configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TornetConfig {
    /// Local SOCKS proxy exposed by the Tor daemon
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// IP probing and geolocation endpoints
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Tor control port settings
    #[serde(default)]
    pub control: ControlConfig,

    /// Verified-rotation retry policy
    #[serde(default)]
    pub rotation: RotationConfig,

    /// Scheduling loop settings
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Diagnostic output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TornetConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.proxy.validate()?;
        self.probe.validate()?;
        self.control.validate()?;
        self.rotation.validate()?;
        self.schedule.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Diagnostic logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Verbose output; forces the debug level
    #[serde(default)]
    pub verbose: bool,

    /// Level name: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LoggingConfig {
    /// Level the subscriber should be installed with
    pub fn max_level(&self) -> Result<tracing::Level, crate::Error> {
        if self.verbose {
            return Ok(tracing::Level::DEBUG);
        }

        match self.level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(crate::Error::config(format!(
                "Log level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                self.level
            ))),
        }
    }

    fn validate(&self) -> Result<(), crate::Error> {
        self.max_level().map(|_| ())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            level: default_log_level(),
        }
    }
}

/// SOCKS proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Host the SOCKS listener is bound to
    #[serde(default = "default_local_host")]
    pub host: String,

    /// SOCKS port
    #[serde(default = "default_socks_port")]
    pub socks_port: u16,
}

impl ProxyConfig {
    /// Proxy URL for HTTP clients
    ///
    /// Uses `socks5h` so hostnames are resolved inside the Tor network.
    pub fn socks_url(&self) -> String {
        format!("socks5h://{}:{}", self.host, self.socks_port)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("SOCKS proxy host cannot be empty"));
        }
        if self.socks_port == 0 {
            return Err(crate::Error::config("SOCKS proxy port must be > 0"));
        }
        Ok(())
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_local_host(),
            socks_port: default_socks_port(),
        }
    }
}

/// IP probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Public IP-echo endpoint returning the caller's address as plain text
    #[serde(default = "default_ip_echo_url")]
    pub ip_echo_url: String,

    /// Geolocation endpoint; `{ip}` is replaced with the address
    #[serde(default = "default_geolocation_url")]
    pub geolocation_url: String,

    /// Look up the country of each new IP
    #[serde(default = "default_true")]
    pub geolocate: bool,

    /// Timeout for lookups through Tor (cold circuits are slow)
    #[serde(default = "default_tor_timeout_secs")]
    pub tor_timeout_secs: u64,

    /// Timeout for direct lookups
    #[serde(default = "default_direct_timeout_secs")]
    pub direct_timeout_secs: u64,

    /// Timeout for geolocation lookups
    #[serde(default = "default_geolocation_timeout_secs")]
    pub geolocation_timeout_secs: u64,

    /// URL used by the startup connectivity precheck
    #[serde(default = "default_connectivity_url")]
    pub connectivity_url: String,

    /// Timeout for each connectivity attempt
    #[serde(default = "default_connectivity_timeout_secs")]
    pub connectivity_timeout_secs: u64,

    /// Number of connectivity attempts before giving up
    #[serde(default = "default_connectivity_attempts")]
    pub connectivity_attempts: u32,
}

impl ProbeConfig {
    /// Geolocation URL for a given address
    pub fn geolocation_url_for(&self, ip: &str) -> String {
        self.geolocation_url.replace("{ip}", ip)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        for (name, url) in [
            ("IP echo URL", &self.ip_echo_url),
            ("Geolocation URL", &self.geolocation_url),
            ("Connectivity URL", &self.connectivity_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(crate::Error::config(format!(
                    "{} must use HTTP or HTTPS scheme. Got: {}",
                    name, url
                )));
            }
        }

        if !self.geolocation_url.contains("{ip}") {
            return Err(crate::Error::config(
                "Geolocation URL must contain an {ip} placeholder",
            ));
        }

        if self.tor_timeout_secs == 0
            || self.direct_timeout_secs == 0
            || self.geolocation_timeout_secs == 0
            || self.connectivity_timeout_secs == 0
        {
            return Err(crate::Error::config("Probe timeouts must be > 0"));
        }

        if self.connectivity_attempts == 0 {
            return Err(crate::Error::config("Connectivity attempts must be > 0"));
        }

        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ip_echo_url: default_ip_echo_url(),
            geolocation_url: default_geolocation_url(),
            geolocate: true,
            tor_timeout_secs: default_tor_timeout_secs(),
            direct_timeout_secs: default_direct_timeout_secs(),
            geolocation_timeout_secs: default_geolocation_timeout_secs(),
            connectivity_url: default_connectivity_url(),
            connectivity_timeout_secs: default_connectivity_timeout_secs(),
            connectivity_attempts: default_connectivity_attempts(),
        }
    }
}

/// Tor control port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Whether the control channel may be used at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Control port host
    #[serde(default = "default_local_host")]
    pub host: String,

    /// Control port
    #[serde(default = "default_control_port")]
    pub port: u16,

    /// Authentication method
    #[serde(default)]
    pub auth: ControlAuth,

    /// Connect and per-reply timeout
    #[serde(default = "default_control_timeout_secs")]
    pub timeout_secs: u64,
}

impl ControlConfig {
    /// Connect/reply timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("Control port host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("Control port must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Control timeout must be > 0"));
        }
        if let ControlAuth::Password { password } = &self.auth
            && password.is_empty()
        {
            return Err(crate::Error::config("Control password cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_local_host(),
            port: default_control_port(),
            auth: ControlAuth::default(),
            timeout_secs: default_control_timeout_secs(),
        }
    }
}

/// Control port authentication method
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ControlAuth {
    /// Pick from the methods advertised by PROTOCOLINFO
    #[default]
    Auto,

    /// No authentication (`CookieAuthentication 0`, no password)
    Null,

    /// Cookie file authentication
    Cookie {
        /// Cookie path; when absent the COOKIEFILE from PROTOCOLINFO is used
        path: Option<String>,
    },

    /// HashedControlPassword authentication
    Password {
        /// Plain-text password
        password: String,
    },
}

// Custom Debug implementation that hides the password
impl fmt::Debug for ControlAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAuth::Auto => f.write_str("Auto"),
            ControlAuth::Null => f.write_str("Null"),
            ControlAuth::Cookie { path } => f.debug_struct("Cookie").field("path", path).finish(),
            ControlAuth::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Verified-rotation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Maximum rotate+probe attempts per rotation request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause after each rotation before re-probing (in seconds)
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,

    /// Stop trying the control channel for the rest of the run after its first failure
    #[serde(default)]
    pub sticky_fallback: bool,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl RotationConfig {
    /// Settle pause as a duration
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.max_retries == 0 {
            return Err(crate::Error::config("Max retries must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            settle_secs: default_settle_secs(),
            sticky_fallback: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Scheduling loop configuration
///
/// Immutable once the loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Pause before each rotation cycle (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Number of cycles; 0 means run until interrupted
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
}

impl ScheduleConfig {
    /// Create a schedule
    pub fn new(interval_secs: u64, repeat_count: u32) -> Self {
        Self {
            interval_secs,
            repeat_count,
        }
    }

    /// Interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Whether the loop runs until interrupted
    pub fn is_infinite(&self) -> bool {
        self.repeat_count == 0
    }

    /// Validate the schedule
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Interval must be > 0 seconds"));
        }
        Ok(())
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::new(default_interval_secs(), default_repeat_count())
    }
}

fn default_true() -> bool {
    true
}

fn default_local_host() -> String {
    "127.0.0.1".to_string()
}

fn default_socks_port() -> u16 {
    9050
}

fn default_control_port() -> u16 {
    9051
}

fn default_control_timeout_secs() -> u64 {
    10
}

fn default_ip_echo_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_geolocation_url() -> String {
    "https://ipapi.co/{ip}/json/".to_string()
}

fn default_connectivity_url() -> String {
    "http://www.google.com".to_string()
}

fn default_tor_timeout_secs() -> u64 {
    30
}

fn default_direct_timeout_secs() -> u64 {
    10
}

fn default_geolocation_timeout_secs() -> u64 {
    5
}

fn default_connectivity_timeout_secs() -> u64 {
    3
}

fn default_connectivity_attempts() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_settle_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_interval_secs() -> u64 {
    60
}

fn default_repeat_count() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}
