// # tornet - Automate IP address changes using Tor
//
// Thin integration layer over tornet-core:
// 1. Parse arguments (or `TORNET_*` environment variables) into a TornetConfig
// 2. Initialize logging and a current-thread runtime
// 3. Wire the HTTP prober, control-port client and platform service controller
// 4. Run the rotation schedule until it completes or a signal arrives
//
// ## Modes
//
// - `--ip`: print the current IP (through Tor if it is running) and exit
// - `--auto-fix`: start Tor if needed and report which rotation paths work
// - `--stop`: stop Tor and other tornet processes
// - default: connectivity check, start Tor, rotate on a schedule
//
// ## Example
//
// ```bash
// tornet --interval 120 --count 0
// TORNET_CONTROL_PASSWORD=secret tornet --sticky-fallback -v
// ```

mod cli;
mod control;
mod report;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Mode};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tornet_core::{
    CircuitRotationDriver, Lifecycle, RotationEngine, RunOutcome, ServiceAction, ServiceController,
    TornetConfig,
};
use tornet_probe_http::HttpIpProber;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TornetExitCode {
    /// Schedule complete, explicit stop, or interrupted by the user
    CleanShutdown = 0,
    /// Invalid configuration or a failed startup precheck
    StartupError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<TornetExitCode> for ExitCode {
    fn from(code: TornetExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return TornetExitCode::StartupError.into();
        }
    };

    let log_level = match config.logging.max_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return TornetExitCode::StartupError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TornetExitCode::StartupError.into();
    }

    info!("Starting tornet v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    // One activity at a time: no worker threads
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TornetExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run(cli.mode(), config).await {
            Ok(code) => code,
            Err(e) => {
                error!("tornet error: {}", e);
                TornetExitCode::RuntimeError
            }
        }
    });

    code.into()
}

async fn run(mode: Mode, config: TornetConfig) -> Result<TornetExitCode> {
    // Installed first so an early Ctrl-C never falls through to the default action
    let signal = shutdown_signal()?;

    let service = tornet_service::detect();
    let prober = Arc::new(HttpIpProber::new(&config.proxy, &config.probe)?);
    let driver = CircuitRotationDriver::new(
        control::build(&config.control),
        service.clone(),
        config.rotation.sticky_fallback,
    );
    let lifecycle = Lifecycle::for_driver(&driver);
    let (engine, events) =
        RotationEngine::new(prober.clone(), driver, &config, lifecycle.cancellation_token())?;

    let token = lifecycle.cancellation_token();
    tokio::spawn(async move {
        signal.await;
        token.cancel();
    });

    if mode != Mode::ShowIp && !service.is_installed().await {
        report::problem(format!(
            "Tor is not installed or not found. {}",
            service.platform().install_hint()
        ));
        return Ok(TornetExitCode::StartupError);
    }

    match mode {
        Mode::ShowIp => {
            let shown = lifecycle
                .unless_shutdown(async {
                    match engine.current_ip().await {
                        Some(ip) => {
                            let country = engine.geolocate(&ip).await;
                            report::identity(&ip, &country);
                        }
                        None => report::problem("Could not determine the current IP address"),
                    }
                })
                .await;
            if shown.is_none() {
                report::problem("Program terminated by user.");
            }
            Ok(TornetExitCode::CleanShutdown)
        }
        Mode::AutoFix => {
            if lifecycle
                .unless_shutdown(auto_fix(service.as_ref(), &config))
                .await
                .is_none()
            {
                return Ok(interrupted(&lifecycle).await);
            }
            Ok(TornetExitCode::CleanShutdown)
        }
        Mode::Stop => {
            // A signal here only cancels the token; teardown is already under way
            lifecycle.teardown().await;
            report::ok("Tor services and tornet processes stopped.");
            Ok(TornetExitCode::CleanShutdown)
        }
        Mode::Rotate => {
            report::progress("Checking internet connection...");
            match lifecycle.unless_shutdown(prober.check_connectivity()).await {
                None => return Ok(interrupted(&lifecycle).await),
                Some(false) => {
                    report::problem("Could not establish internet connection. Exiting.");
                    return Ok(TornetExitCode::StartupError);
                }
                Some(true) => report::ok("Internet connection OK."),
            }

            if lifecycle
                .unless_shutdown(ensure_started(service.as_ref()))
                .await
                .is_none()
            {
                return Ok(interrupted(&lifecycle).await);
            }

            let reporter = tokio::spawn(report::report_events(ReceiverStream::new(events)));

            let outcome = lifecycle
                .supervise(&engine, config.schedule, lifecycle.shutdown_requested())
                .await?;

            // Closing the event channel lets the reporter drain and finish
            drop(engine);
            if let Err(e) = reporter.await {
                debug!("Event reporter ended abnormally: {}", e);
            }

            let summary = outcome.summary();
            info!(
                "Run finished: {} cycles, {} changed, {} failed",
                summary.cycles, summary.succeeded, summary.failed
            );
            match outcome {
                RunOutcome::Interrupted(_) => {
                    report::ok("Tor services and tornet processes stopped.");
                    report::problem("Program terminated by user.");
                }
                RunOutcome::Completed(summary) => report::ok(format!(
                    "Done: IP changed {} of {} times.",
                    summary.succeeded, summary.cycles
                )),
            }
            Ok(TornetExitCode::CleanShutdown)
        }
    }
}

/// Tear down after a signal that arrived before the rotation loop
async fn interrupted(lifecycle: &Lifecycle) -> TornetExitCode {
    lifecycle.teardown().await;
    report::ok("Tor services and tornet processes stopped.");
    report::problem("Program terminated by user.");
    TornetExitCode::CleanShutdown
}

/// Start Tor unless it is already running
async fn ensure_started(service: &dyn ServiceController) {
    if service.is_running().await {
        debug!("Tor is already running");
    } else {
        match service.start().await {
            Ok(ServiceAction::Dispatched) => {
                report::ok("Tor service started. Please wait a minute for Tor to connect.")
            }
            Ok(ServiceAction::Manual { guidance }) => report::progress(guidance),
            Err(e) => report::problem(format!("Failed to start Tor service: {}", e)),
        }
    }

    report::ok(format!(
        "Your current OS is: {} ({})",
        service.platform(),
        std::env::consts::ARCH
    ));
}

/// Start Tor if needed and report which rotation paths are usable
async fn auto_fix(service: &dyn ServiceController, config: &TornetConfig) {
    report::progress("Running auto-fix...");
    ensure_started(service).await;

    match control::diagnose(&config.control).await {
        Ok(details) => report::ok(format!("Control port usable: {}", details)),
        Err(reason) => report::problem(format!("Control port not usable: {}", reason)),
    }

    if service.is_running().await {
        report::ok(format!(
            "Service reload available via the {} service manager",
            service.platform()
        ));
    } else {
        report::problem("Tor is not running; service reload will not rotate circuits");
    }

    report::ok("Auto-fix complete.");
}

/// Resolves on SIGINT or SIGQUIT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
    let mut sigquit = signal(SignalKind::quit())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGQUIT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => debug!("Received SIGINT"),
            _ = sigquit.recv() => debug!("Received SIGQUIT"),
        }
    })
}

/// Resolves on Ctrl-C
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
}
