//! Stray tornet process termination

use crate::runner::CommandRunner;
use tornet_core::Result;
use tracing::{debug, warn};

/// Process name other tornet instances run under
pub const PROCESS_NAME: &str = "tornet";

/// PIDs listed by `pgrep`, minus `own_pid`
pub(crate) fn parse_pids(stdout: &str, own_pid: u32) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| *pid != own_pid)
        .collect()
}

/// Send SIGTERM to every other tornet process
///
/// `pgrep` exits 1 when nothing matches; that is not an error.
pub(crate) async fn terminate_others(runner: &dyn CommandRunner) -> Result<usize> {
    let output = runner.run("pgrep", &["-x", PROCESS_NAME]).await?;
    if !output.success {
        return Ok(0);
    }

    let mut terminated = 0;
    for pid in parse_pids(&output.stdout, std::process::id()) {
        match terminate(pid) {
            Ok(()) => {
                debug!("Sent SIGTERM to tornet process {}", pid);
                terminated += 1;
            }
            Err(e) => warn!("Failed to signal tornet process {}: {}", pid, e),
        }
    }
    Ok(terminated)
}

#[cfg(unix)]
fn terminate(pid: u32) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: kill() has no memory-safety preconditions
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "process signals are not available on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::testing::RecordingRunner;

    #[test]
    fn test_parse_pids_excludes_self() {
        assert_eq!(parse_pids("101\n4242\n  303 \n", 4242), vec![101, 303]);
        assert_eq!(parse_pids("", 1), Vec::<u32>::new());
        assert_eq!(parse_pids("garbage\n7\n", 1), vec![7]);
    }

    #[tokio::test]
    async fn test_no_match_is_zero() {
        let runner = RecordingRunner::new().answer("pgrep", false, "");
        assert_eq!(terminate_others(&runner).await.unwrap(), 0);
        assert_eq!(runner.calls(), vec!["pgrep -x tornet"]);
    }

    #[tokio::test]
    async fn test_never_signals_self() {
        let own = std::process::id().to_string();
        let runner = RecordingRunner::new().answer("pgrep", true, &own);
        assert_eq!(terminate_others(&runner).await.unwrap(), 0);
    }
}
