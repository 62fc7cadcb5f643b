//! Control-port replies and PROTOCOLINFO parsing
//!
//! A reply is one or more lines of the form `<code><sep><text>` where `sep` is
//! `-` (more lines follow), `+` (a data block terminated by a lone `.` follows)
//! or a space (final line).

use tornet_core::{Error, Result};

/// Command accepted
pub const OK: u16 = 250;

/// Authentication required before this command
pub const AUTH_REQUIRED: u16 = 514;

/// Authentication failed
pub const AUTH_FAILED: u16 = 515;

/// How a reply line continues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Separator {
    /// `-`: another line follows
    Mid,
    /// `+`: a data block follows
    Data,
    /// ` `: last line of the reply
    End,
}

/// One parsed reply line
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ReplyLine<'a> {
    pub code: u16,
    pub separator: Separator,
    pub text: &'a str,
}

impl<'a> ReplyLine<'a> {
    pub fn parse(line: &'a str) -> Result<Self> {
        let malformed = || Error::control(format!("Malformed reply line: {:?}", line));

        let code = line
            .get(..3)
            .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|code| code.parse().ok())
            .ok_or_else(malformed)?;

        let separator = match line.as_bytes().get(3) {
            Some(b'-') => Separator::Mid,
            Some(b'+') => Separator::Data,
            Some(b' ') | None => Separator::End,
            Some(_) => return Err(malformed()),
        };

        Ok(Self {
            code,
            separator,
            text: line.get(4..).unwrap_or(""),
        })
    }
}

/// A complete control-port reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code of the final line
    pub code: u16,
    /// Text of every line, data blocks included
    pub lines: Vec<String>,
}

impl Reply {
    /// Whether the command was accepted
    pub fn is_ok(&self) -> bool {
        self.code == OK
    }

    /// Text of the final line
    pub fn message(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    /// Turn a non-250 reply into an error
    ///
    /// 514/515 become `Error::Authentication`, everything else `Error::Control`.
    pub fn into_result(self) -> Result<Self> {
        match self.code {
            OK => Ok(self),
            AUTH_REQUIRED | AUTH_FAILED => Err(Error::auth(format!(
                "{} {}",
                self.code,
                self.message()
            ))),
            code => Err(Error::control(format!("{} {}", code, self.message()))),
        }
    }
}

/// Authentication details advertised by `PROTOCOLINFO 1`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Advertised methods, upper case (`NULL`, `COOKIE`, `SAFECOOKIE`, `HASHEDPASSWORD`)
    pub auth_methods: Vec<String>,
    /// Cookie location, when cookie authentication is enabled
    pub cookie_file: Option<String>,
    /// Tor version string
    pub tor_version: Option<String>,
}

impl ProtocolInfo {
    /// Parse a PROTOCOLINFO reply
    pub fn parse(reply: &Reply) -> Result<Self> {
        let mut info = ProtocolInfo::default();
        let mut saw_auth = false;

        for line in &reply.lines {
            if let Some(rest) = line.strip_prefix("AUTH ") {
                saw_auth = true;
                let mut rest = rest.trim_start();
                while !rest.is_empty() {
                    if let Some(methods) = rest.strip_prefix("METHODS=") {
                        let end = methods.find(' ').unwrap_or(methods.len());
                        info.auth_methods = methods[..end]
                            .split(',')
                            .filter(|m| !m.is_empty())
                            .map(str::to_ascii_uppercase)
                            .collect();
                        rest = &methods[end..];
                    } else if let Some(path) = rest.strip_prefix("COOKIEFILE=") {
                        let (value, remainder) = unquote(path)?;
                        info.cookie_file = Some(value);
                        rest = remainder;
                    } else {
                        // Unknown key; skip the token
                        let end = rest.find(' ').unwrap_or(rest.len());
                        rest = &rest[end..];
                    }
                    rest = rest.trim_start();
                }
            } else if let Some(version) = line.strip_prefix("VERSION Tor=") {
                info.tor_version = Some(unquote(version)?.0);
            }
        }

        if !saw_auth {
            return Err(Error::control("PROTOCOLINFO reply has no AUTH line"));
        }
        Ok(info)
    }

    /// Whether `method` is advertised
    pub fn supports(&self, method: &str) -> bool {
        self.auth_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// Read a QuotedString; returns the unescaped value and the remaining input
fn unquote(input: &str) -> Result<(String, &str)> {
    let body = input
        .strip_prefix('"')
        .ok_or_else(|| Error::control(format!("Expected quoted string: {:?}", input)))?;

    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'r')) => value.push('\r'),
                Some((_, 'n')) => value.push('\n'),
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            '"' => return Ok((value, &body[i + 1..])),
            c => value.push(c),
        }
    }
    Err(Error::control(format!("Unterminated quoted string: {:?}", input)))
}

/// Encode a QuotedString
pub(crate) fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            // A raw CR or LF would end the command line early
            '\r' => quoted.push_str("\\r"),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(code: u16, lines: &[&str]) -> Reply {
        Reply {
            code,
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_reply_lines() {
        let mid = ReplyLine::parse("250-PROTOCOLINFO 1").unwrap();
        assert_eq!(mid.code, 250);
        assert_eq!(mid.separator, Separator::Mid);
        assert_eq!(mid.text, "PROTOCOLINFO 1");

        let end = ReplyLine::parse("250 OK").unwrap();
        assert_eq!(end.separator, Separator::End);

        let data = ReplyLine::parse("250+info/names=").unwrap();
        assert_eq!(data.separator, Separator::Data);

        assert!(ReplyLine::parse("OK").is_err());
        assert!(ReplyLine::parse("25x OK").is_err());
        assert!(ReplyLine::parse("250*OK").is_err());
    }

    #[test]
    fn test_error_codes() {
        assert!(reply(250, &["OK"]).into_result().is_ok());

        let auth = reply(515, &["Authentication failed: Wrong length on authentication cookie."])
            .into_result()
            .unwrap_err();
        assert!(matches!(auth, Error::Authentication(_)));

        let required = reply(514, &["Authentication required."]).into_result().unwrap_err();
        assert!(matches!(required, Error::Authentication(_)));

        let other = reply(552, &["Unrecognized signal code \"NEWNYMM\""])
            .into_result()
            .unwrap_err();
        assert!(matches!(other, Error::Control(_)));
        assert!(other.to_string().contains("552"));
    }

    #[test]
    fn test_protocol_info_cookie() {
        let info = ProtocolInfo::parse(&reply(
            250,
            &[
                "PROTOCOLINFO 1",
                "AUTH METHODS=COOKIE,SAFECOOKIE COOKIEFILE=\"/run/tor/control.authcookie\"",
                "VERSION Tor=\"0.4.8.9\"",
                "OK",
            ],
        ))
        .unwrap();

        assert_eq!(info.auth_methods, vec!["COOKIE", "SAFECOOKIE"]);
        assert_eq!(info.cookie_file.as_deref(), Some("/run/tor/control.authcookie"));
        assert_eq!(info.tor_version.as_deref(), Some("0.4.8.9"));
        assert!(info.supports("cookie"));
        assert!(!info.supports("NULL"));
    }

    #[test]
    fn test_protocol_info_escaped_cookie_path() {
        let info = ProtocolInfo::parse(&reply(
            250,
            &[r#"AUTH METHODS=COOKIE COOKIEFILE="C:\\Users\\me\\tor \"data\"\\control_auth_cookie""#],
        ))
        .unwrap();

        assert_eq!(
            info.cookie_file.as_deref(),
            Some(r#"C:\Users\me\tor "data"\control_auth_cookie"#)
        );
    }

    #[test]
    fn test_protocol_info_null_and_password() {
        let info = ProtocolInfo::parse(&reply(250, &["AUTH METHODS=NULL", "OK"])).unwrap();
        assert!(info.supports("NULL"));
        assert_eq!(info.cookie_file, None);

        let info = ProtocolInfo::parse(&reply(250, &["AUTH METHODS=HASHEDPASSWORD", "OK"])).unwrap();
        assert!(info.supports("HASHEDPASSWORD"));
    }

    #[test]
    fn test_protocol_info_requires_auth_line() {
        assert!(ProtocolInfo::parse(&reply(250, &["PROTOCOLINFO 1", "OK"])).is_err());
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("secret"), "\"secret\"");
        assert_eq!(quote(r#"pa"ss\word"#), r#""pa\"ss\\word""#);
    }

    #[test]
    fn test_quote_escapes_line_breaks() {
        let quoted = quote("pass\r\nSIGNAL HALT");
        assert_eq!(quoted, r#""pass\r\nSIGNAL HALT""#);
        assert!(!quoted.contains('\r') && !quoted.contains('\n'));

        let (value, rest) = unquote(&quoted).unwrap();
        assert_eq!(value, "pass\r\nSIGNAL HALT");
        assert!(rest.is_empty());
    }
}
