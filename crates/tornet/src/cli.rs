//! Command-line arguments
//!
//! Every option can also come from a `TORNET_*` environment variable.

use anyhow::Result;
use clap::Parser;
use tornet_core::{ControlAuth, ScheduleConfig, TornetConfig};

/// TorNet - Automate IP address changes using Tor
#[derive(Debug, Parser)]
#[command(name = "tornet", version, about)]
pub struct Cli {
    /// Time in seconds between IP changes
    #[arg(long, default_value_t = 60, env = "TORNET_INTERVAL")]
    pub interval: u64,

    /// Number of times to change the IP. If 0, change IP indefinitely
    #[arg(long, default_value_t = 10, env = "TORNET_COUNT")]
    pub count: u32,

    /// Display the current IP address and exit
    #[arg(long)]
    pub ip: bool,

    /// Stop all Tor services and tornet processes and exit
    #[arg(long)]
    pub stop: bool,

    /// Start Tor if needed and report which rotation paths work
    #[arg(long)]
    pub auto_fix: bool,

    /// Enable verbose/debug output
    #[arg(short, long, env = "TORNET_VERBOSE")]
    pub verbose: bool,

    /// Rotation attempts per IP change
    #[arg(long, default_value_t = 3, env = "TORNET_MAX_RETRIES")]
    pub max_retries: u32,

    /// Seconds to wait for a new circuit before re-checking the IP
    #[arg(long, default_value_t = 5, env = "TORNET_SETTLE_SECS")]
    pub settle: u64,

    /// Tor SOCKS port
    #[arg(long, default_value_t = 9050, env = "TORNET_SOCKS_PORT")]
    pub socks_port: u16,

    /// Tor control port
    #[arg(long, default_value_t = 9051, env = "TORNET_CONTROL_PORT")]
    pub control_port: u16,

    /// Control port password (HashedControlPassword)
    #[arg(long, env = "TORNET_CONTROL_PASSWORD", hide_env_values = true)]
    pub control_password: Option<String>,

    /// Control port cookie file (defaults to the one Tor advertises)
    #[arg(long, env = "TORNET_COOKIE_FILE", conflicts_with = "control_password")]
    pub cookie_file: Option<String>,

    /// Never use the control port; always reload the Tor service
    #[arg(long)]
    pub no_control: bool,

    /// Stop trying the control port after its first failure
    #[arg(long, env = "TORNET_STICKY_FALLBACK")]
    pub sticky_fallback: bool,

    /// Log level (trace, debug, info, warn, error); --verbose forces debug
    #[arg(long, default_value = "info", env = "TORNET_LOG_LEVEL")]
    pub log_level: String,
}

/// What this invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ShowIp,
    AutoFix,
    Stop,
    Rotate,
}

impl Cli {
    /// Selected mode; `--ip` wins over `--auto-fix`, which wins over `--stop`
    pub fn mode(&self) -> Mode {
        if self.ip {
            Mode::ShowIp
        } else if self.auto_fix {
            Mode::AutoFix
        } else if self.stop {
            Mode::Stop
        } else {
            Mode::Rotate
        }
    }

    /// Build and validate the runtime configuration
    pub fn to_config(&self) -> Result<TornetConfig> {
        let mut config = TornetConfig::new();
        config.logging.verbose = self.verbose;
        config.logging.level = self.log_level.clone();

        config.proxy.socks_port = self.socks_port;

        config.control.enabled = !self.no_control;
        config.control.port = self.control_port;
        config.control.auth = match (&self.control_password, &self.cookie_file) {
            (Some(password), _) => ControlAuth::Password {
                password: password.clone(),
            },
            (None, Some(path)) => ControlAuth::Cookie {
                path: Some(path.clone()),
            },
            (None, None) => ControlAuth::Auto,
        };

        config.rotation.max_retries = self.max_retries;
        config.rotation.settle_secs = self.settle;
        config.rotation.sticky_fallback = self.sticky_fallback;

        config.schedule = ScheduleConfig::new(self.interval, self.count);

        config.validate()?;
        Ok(config)
    }
}
