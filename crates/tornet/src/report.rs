//! User-facing status lines
//!
//! Diagnostics go through `tracing` on stderr; the lines here are the tool's
//! actual output and go to stdout.

use chrono::Local;
use tokio_stream::{Stream, StreamExt};
use tornet_core::EngineEvent;
use tornet_core::traits::UNKNOWN_COUNTRY;

pub fn ok(message: impl AsRef<str>) {
    println!(" [+] {}", message.as_ref());
}

pub fn progress(message: impl AsRef<str>) {
    println!(" [~] {}", message.as_ref());
}

pub fn problem(message: impl AsRef<str>) {
    println!(" [!] {}", message.as_ref());
}

/// Print the current identity
pub fn identity(ip: &str, country: &str) {
    ok(format!("Your current IP is : {} ({})", ip, country));
}

/// Render one engine event, if it is worth showing
pub fn status_line(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Started {
            interval_secs,
            repeat_count: 0,
        } => Some(format!(
            " [+] Changing IP every {} seconds until interrupted",
            interval_secs
        )),
        EngineEvent::Started {
            interval_secs,
            repeat_count,
        } => Some(format!(
            " [+] Changing IP every {} seconds, {} times",
            interval_secs, repeat_count
        )),
        EngineEvent::StrategyDowngraded { reason } => Some(format!(
            " [!] Control port failed ({}). Reloading the Tor service instead",
            reason
        )),
        EngineEvent::ManualActionRequired { guidance } => Some(format!(" [!] {}", guidance)),
        EngineEvent::IdentityReported { ip, country, at } => Some(format!(
            " [+] Your IP has been changed to : {} ({}) at {}",
            ip,
            country.as_deref().unwrap_or(UNKNOWN_COUNTRY),
            at.with_timezone(&Local).format("%H:%M:%S")
        )),
        EngineEvent::CycleFailed { attempts } => Some(format!(
            " [!] Failed to change IP after {} attempts",
            attempts
        )),
        _ => None,
    }
}

/// Print status lines until the engine drops its sender
pub async fn report_events<S>(mut events: S)
where
    S: Stream<Item = EngineEvent> + Unpin,
{
    while let Some(event) = events.next().await {
        if let Some(line) = status_line(&event) {
            println!("{}", line);
        }
    }
}
