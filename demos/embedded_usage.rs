//! Minimal embedding example for tornet-core
//!
//! This example drives the rotation engine with in-process components instead
//! of a real Tor daemon: a simulated exit pool, a control channel that fails
//! every other call, and a service controller that only prints. The schedule
//! is supervised with Ctrl-C as the shutdown signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tornet_core::{
    CircuitRotationDriver, ControlChannel, Error, IpProber, Lifecycle, Platform, Result,
    RotationEngine, Route, RunOutcome, ScheduleConfig, ServiceAction, ServiceController,
    TornetConfig,
};

/// Exit addresses the simulated circuit cycles through
const EXITS: &[(&str, &str)] = &[
    ("185.220.101.4", "Germany"),
    ("185.220.101.4", "Germany"),
    ("109.70.100.23", "Austria"),
    ("171.25.193.77", "Sweden"),
    ("23.129.64.130", "United States"),
];

/// Simulated Tor network: each NEWNYM moves to the next exit
#[derive(Default)]
struct SimulatedNetwork {
    exit: AtomicUsize,
}

impl SimulatedNetwork {
    fn rotate(&self) {
        self.exit.fetch_add(1, Ordering::SeqCst);
    }

    fn current(&self) -> (&'static str, &'static str) {
        EXITS[self.exit.load(Ordering::SeqCst) % EXITS.len()]
    }
}

struct EmbeddedProber {
    network: Arc<SimulatedNetwork>,
}

#[async_trait::async_trait]
impl IpProber for EmbeddedProber {
    async fn probe(&self, route: Route) -> Option<String> {
        match route {
            Route::Tor => Some(self.network.current().0.to_string()),
            Route::Direct => Some("203.0.113.10".to_string()),
        }
    }

    async fn geolocate(&self, ip: &str) -> String {
        EXITS
            .iter()
            .find(|(exit, _)| *exit == ip)
            .map(|(_, country)| country.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Control channel that rejects every other NEWNYM
struct FlakyControl {
    network: Arc<SimulatedNetwork>,
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl ControlChannel for FlakyControl {
    fn supports_control_channel(&self) -> bool {
        true
    }

    async fn new_identity(&self) -> Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(Error::auth("515 Authentication failed (simulated)"));
        }
        self.network.rotate();
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        println!("[Embedded] Control session closed");
        Ok(())
    }
}

/// Service controller whose reload also rotates the simulated circuit
struct EmbeddedService {
    network: Arc<SimulatedNetwork>,
}

#[async_trait::async_trait]
impl ServiceController for EmbeddedService {
    fn platform(&self) -> Platform {
        Platform::detect()
    }

    async fn is_installed(&self) -> bool {
        true
    }

    async fn is_running(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<ServiceAction> {
        Ok(ServiceAction::Dispatched)
    }

    async fn stop(&self) -> Result<ServiceAction> {
        println!("[Embedded] Service stopped");
        Ok(ServiceAction::Dispatched)
    }

    async fn reload(&self) -> Result<ServiceAction> {
        println!("[Embedded] Service reloaded");
        self.network.rotate();
        Ok(ServiceAction::Dispatched)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    println!("=== Embedded tornet-core Example ===\n");

    let network = Arc::new(SimulatedNetwork::default());
    let prober = Arc::new(EmbeddedProber {
        network: network.clone(),
    });
    let control = Arc::new(FlakyControl {
        network: network.clone(),
        calls: AtomicU32::new(0),
    });
    let service = Arc::new(EmbeddedService {
        network: network.clone(),
    });

    let mut config = TornetConfig::new();
    config.rotation.settle_secs = 1;
    config.rotation.event_channel_capacity = 100;

    println!("1. Creating engine...");
    let driver = CircuitRotationDriver::new(control, service, config.rotation.sticky_fallback);
    let lifecycle = Lifecycle::for_driver(&driver);
    let (engine, events) =
        RotationEngine::new(prober, driver, &config, lifecycle.cancellation_token())?;

    let listener = tokio::spawn(async move {
        let mut events = ReceiverStream::new(events);
        while let Some(event) = events.next().await {
            println!("[Event] {:?}", event);
        }
    });

    println!("2. Rotating every 2 seconds, 4 times (Ctrl-C to interrupt)...\n");
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let outcome = lifecycle
        .supervise(&engine, ScheduleConfig::new(2, 4), shutdown)
        .await?;

    drop(engine);
    let _ = tokio::time::timeout(Duration::from_secs(1), listener).await;

    let summary = outcome.summary();
    println!(
        "\n3. {} after {} cycles ({} changed, {} failed)",
        match outcome {
            RunOutcome::Completed(_) => "Completed",
            RunOutcome::Interrupted(_) => "Interrupted",
        },
        summary.cycles,
        summary.succeeded,
        summary.failed
    );
    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Every collaborator is supplied by the application");
    println!("- Shutdown is just a future handed to Lifecycle::supervise");
    println!("- Teardown only runs when the schedule is interrupted");

    Ok(())
}
