//! Control channel selection
//!
//! With the `control` feature the Tor control-port client is used; without
//! it every rotation goes through the service manager.

use std::sync::Arc;
use tornet_core::{ControlChannel, ControlConfig};

#[cfg(feature = "control")]
pub fn build(config: &ControlConfig) -> Arc<dyn ControlChannel> {
    Arc::new(tornet_control::TorControlClient::new(config.clone()))
}

#[cfg(not(feature = "control"))]
pub fn build(_config: &ControlConfig) -> Arc<dyn ControlChannel> {
    Arc::new(tornet_core::traits::DisabledControlChannel)
}

/// Check the control path without rotating; `Err` carries the reason it is unusable
#[cfg(feature = "control")]
pub async fn diagnose(config: &ControlConfig) -> Result<String, String> {
    if !config.enabled {
        return Err("disabled by --no-control".to_string());
    }

    let client = tornet_control::TorControlClient::new(config.clone());
    match client.check().await {
        Ok(info) => Ok(format!(
            "{} (Tor {}, auth methods: {})",
            client.address(),
            info.tor_version.as_deref().unwrap_or("unknown"),
            info.auth_methods.join(",")
        )),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(not(feature = "control"))]
pub async fn diagnose(_config: &ControlConfig) -> Result<String, String> {
    Err("built without the control feature".to_string())
}
