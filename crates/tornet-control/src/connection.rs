//! Control-port connection
//!
//! Generic over the stream so tests can drive it with an in-memory mock.

use crate::reply::{ProtocolInfo, Reply, ReplyLine, Separator, quote};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tornet_core::{ControlAuth, Error, Result};
use tracing::debug;

/// Credential chosen for `AUTHENTICATE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Credential {
    Null,
    Password(String),
    CookieFile(PathBuf),
}

impl Credential {
    /// Pick a credential from the configured method and what Tor advertises
    ///
    /// `info` is only needed for [`ControlAuth::Auto`] and for cookie
    /// authentication without an explicit path.
    pub fn select(auth: &ControlAuth, info: Option<&ProtocolInfo>) -> Result<Self> {
        match auth {
            ControlAuth::Null => Ok(Credential::Null),
            ControlAuth::Password { password } => Ok(Credential::Password(password.clone())),
            ControlAuth::Cookie { path: Some(path) } => Ok(Credential::CookieFile(path.into())),
            ControlAuth::Cookie { path: None } => info
                .and_then(|info| info.cookie_file.as_ref())
                .map(|path| Credential::CookieFile(path.into()))
                .ok_or_else(|| Error::auth("Tor did not advertise a cookie file")),
            ControlAuth::Auto => {
                let info = info.ok_or_else(|| Error::control("PROTOCOLINFO required"))?;
                if info.supports("NULL") {
                    Ok(Credential::Null)
                } else if info.supports("COOKIE")
                    && let Some(path) = &info.cookie_file
                {
                    Ok(Credential::CookieFile(path.into()))
                } else if info.supports("HASHEDPASSWORD") {
                    Err(Error::auth(
                        "Tor requires a control password (HashedControlPassword is set)",
                    ))
                } else {
                    Err(Error::auth(format!(
                        "No supported authentication method (advertised: {})",
                        info.auth_methods.join(",")
                    )))
                }
            }
        }
    }

    async fn command(&self) -> Result<String> {
        match self {
            Credential::Null => Ok("AUTHENTICATE".to_string()),
            Credential::Password(password) => Ok(format!("AUTHENTICATE {}", quote(password))),
            Credential::CookieFile(path) => {
                let cookie = tokio::fs::read(path).await.map_err(|e| {
                    Error::auth(format!("Cannot read cookie file {}: {}", path.display(), e))
                })?;
                if cookie.is_empty() {
                    return Err(Error::auth(format!("Cookie file {} is empty", path.display())));
                }
                Ok(format!("AUTHENTICATE {}", hex::encode_upper(cookie)))
            }
        }
    }
}

/// One control-port session
pub struct ControlConnection<S> {
    stream: BufReader<S>,
    timeout: Duration,
}

impl<S> ControlConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream; `timeout` bounds every reply
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeout,
        }
    }

    /// Send a command and return its reply, failing on a non-250 status
    pub async fn command(&mut self, command: &str) -> Result<Reply> {
        self.send(command).await?;
        self.read_reply().await?.into_result()
    }

    /// Ask Tor which authentication methods it accepts
    pub async fn protocol_info(&mut self) -> Result<ProtocolInfo> {
        let reply = self.command("PROTOCOLINFO 1").await?;
        ProtocolInfo::parse(&reply)
    }

    /// Authenticate the session
    pub async fn authenticate(&mut self, auth: &ControlAuth) -> Result<()> {
        let needs_info = matches!(auth, ControlAuth::Auto | ControlAuth::Cookie { path: None });
        let info = if needs_info {
            Some(self.protocol_info().await?)
        } else {
            None
        };

        let credential = Credential::select(auth, info.as_ref())?;
        let command = credential.command().await?;
        self.command(&command).await?;
        debug!("Authenticated to Tor control port");
        Ok(())
    }

    /// Request new circuits for subsequent connections
    pub async fn signal_newnym(&mut self) -> Result<()> {
        self.command("SIGNAL NEWNYM").await?;
        Ok(())
    }

    /// Close the session politely
    pub async fn quit(&mut self) -> Result<()> {
        self.command("QUIT").await?;
        Ok(())
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(format!("{}\r\n", command).as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read one complete reply
    pub async fn read_reply(&mut self) -> Result<Reply> {
        match tokio::time::timeout(self.timeout, self.read_reply_lines()).await {
            Ok(reply) => reply,
            Err(_) => Err(Error::control(format!(
                "No reply from control port within {:?}",
                self.timeout
            ))),
        }
    }

    async fn read_reply_lines(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let raw = self.read_line().await?;
            let line = ReplyLine::parse(&raw)?;
            let code = line.code;
            lines.push(line.text.to_string());

            match line.separator {
                Separator::End => return Ok(Reply { code, lines }),
                Separator::Mid => {}
                Separator::Data => loop {
                    let data = self.read_line().await?;
                    if data == "." {
                        break;
                    }
                    // Leading dots are escaped by doubling
                    let data = data.strip_prefix('.').unwrap_or(&data);
                    lines.push(data.to_string());
                },
            }
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.stream.read_line(&mut line).await?;
        if read == 0 {
            return Err(Error::control("Control port closed the connection"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
