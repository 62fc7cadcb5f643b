//! External command execution
//!
//! Service controllers never spawn processes directly; they go through a
//! [`CommandRunner`] so tests can record invocations instead.

use async_trait::async_trait;
use std::process::Stdio;
use tornet_core::{Error, Result, ServiceAction};
use tracing::debug;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status was zero
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`]; `Err` means
    /// the program could not be started at all.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("Running {} {}", program, args.join(" "));

        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::service(format!("Failed to run {}: {}", program, e)))?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a service-manager command, treating a non-zero exit as an error
pub(crate) async fn dispatch(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<ServiceAction> {
    let output = runner.run(program, args).await?;
    if output.success {
        Ok(ServiceAction::Dispatched)
    } else {
        Err(Error::service(format!(
            "`{} {}` failed: {}",
            program,
            args.join(" "),
            output.stderr.trim()
        )))
    }
}

/// Whether a command ran and exited zero
pub(crate) async fn succeeds(runner: &dyn CommandRunner, program: &str, args: &[&str]) -> bool {
    match runner.run(program, args).await {
        Ok(output) => output.success,
        Err(e) => {
            debug!("{}", e);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every invocation and answers from a table keyed by program
    #[derive(Default)]
    pub struct RecordingRunner {
        calls: Mutex<Vec<String>>,
        answers: Mutex<HashMap<String, CommandOutput>>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `program` with the given output (default: success, empty output)
        pub fn answer(self, program: &str, success: bool, stdout: &str) -> Self {
            self.answers.lock().unwrap().insert(
                program.to_string(),
                CommandOutput {
                    success,
                    stdout: stdout.to_string(),
                    stderr: if success { String::new() } else { "exit status 1".to_string() },
                },
            );
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
            let mut call = program.to_string();
            for arg in args {
                call.push(' ');
                call.push_str(arg);
            }
            self.calls.lock().unwrap().push(call);

            Ok(self
                .answers
                .lock()
                .unwrap()
                .get(program)
                .cloned()
                .unwrap_or(CommandOutput {
                    success: true,
                    ..CommandOutput::default()
                }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;

    #[tokio::test]
    async fn test_dispatch_maps_exit_status() {
        let ok = RecordingRunner::new();
        assert_eq!(
            dispatch(&ok, "systemctl", &["reload", "tor"]).await.unwrap(),
            ServiceAction::Dispatched
        );

        let failing = RecordingRunner::new().answer("systemctl", false, "");
        let err = dispatch(&failing, "systemctl", &["reload", "tor"]).await.unwrap_err();
        assert!(err.to_string().contains("systemctl reload tor"));
    }

    #[tokio::test]
    async fn test_missing_program_does_not_succeed() {
        let runner = SystemCommandRunner;
        assert!(!succeeds(&runner, "tornet-no-such-program", &[]).await);
    }
}
