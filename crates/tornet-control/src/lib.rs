// # Tor Control Port Client
//
// This crate provides the ControlChannel implementation for tornet.
//
// ## Protocol
//
// Line-oriented text over TCP (default `127.0.0.1:9051`):
//
// - `PROTOCOLINFO 1`: advertised auth methods and cookie location
// - `AUTHENTICATE`: null, hex-encoded cookie, or quoted password
// - `SIGNAL NEWNYM`: new circuits for subsequent connections
// - `QUIT`: close the session
//
// ## Session Handling
//
// One authenticated session is kept open between rotations. If a command on
// the cached session fails (Tor restarted after a service reload, idle
// timeout), a fresh session is opened once before the error is reported.
//
// ## Security
//
// The control password never appears in logs; `ControlAuth`'s Debug output
// redacts it.

mod connection;
mod reply;

pub use connection::ControlConnection;
pub use reply::{ProtocolInfo, Reply};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tornet_core::{ControlChannel, ControlConfig, Error, Result};
use tracing::{debug, info};

/// Tor control-port client
pub struct TorControlClient {
    config: ControlConfig,
    session: Mutex<Option<ControlConnection<TcpStream>>>,
}

impl std::fmt::Debug for TorControlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorControlClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TorControlClient {
    /// Create a client; no connection is made until the first rotation
    pub fn new(config: ControlConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Control port address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Connect, authenticate and close, reporting what Tor advertised
    ///
    /// Used to check whether the control path is usable without rotating.
    pub async fn check(&self) -> Result<ProtocolInfo> {
        let mut conn = self.connect().await?;
        let info = conn.protocol_info().await?;
        // PROTOCOLINFO may only be sent once before authenticating
        let mut conn = self.connect().await?;
        conn.authenticate(&self.config.auth).await?;
        conn.quit().await?;
        Ok(info)
    }

    async fn connect(&self) -> Result<ControlConnection<TcpStream>> {
        let address = self.address();
        let stream = tokio::time::timeout(self.config.timeout(), TcpStream::connect(&address))
            .await
            .map_err(|_| Error::control(format!("Timed out connecting to {}", address)))?
            .map_err(|e| Error::control(format!("Cannot connect to {}: {}", address, e)))?;

        debug!("Connected to Tor control port at {}", address);
        Ok(ControlConnection::new(stream, self.config.timeout()))
    }

    async fn open_session(&self) -> Result<ControlConnection<TcpStream>> {
        let mut conn = self.connect().await?;
        conn.authenticate(&self.config.auth).await?;
        Ok(conn)
    }
}

#[async_trait]
impl ControlChannel for TorControlClient {
    fn supports_control_channel(&self) -> bool {
        self.config.enabled
    }

    async fn new_identity(&self) -> Result<()> {
        let mut session = self.session.lock().await;

        if let Some(conn) = session.as_mut() {
            match conn.signal_newnym().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Cached control session failed ({}), reconnecting", e);
                    *session = None;
                }
            }
        }

        let mut conn = self.open_session().await?;
        conn.signal_newnym().await?;
        *session = Some(conn);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(mut conn) = self.session.lock().await.take() else {
            return Ok(());
        };
        conn.quit().await?;
        info!("Closed Tor control port session");
        Ok(())
    }
}
