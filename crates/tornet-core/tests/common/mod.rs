//! Test doubles and common utilities for rotation contract tests
//!
//! These doubles record every call so tests can assert on exact counts.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tornet_core::engine::CircuitRotationDriver;
use tornet_core::{
    ControlChannel, EngineEvent, Error, IpProber, Lifecycle, Platform, Result, RotationEngine,
    Route, ServiceAction, ServiceController, TornetConfig,
};

enum ProbeScript {
    /// Pop answers in order; repeat the last one once exhausted
    Queue {
        answers: VecDeque<Option<String>>,
        last: Option<String>,
    },
    /// Every probe sees a new address
    Fresh { next: u32 },
}

/// An IpProber that answers Tor probes from a script
pub struct ScriptedProber {
    script: Mutex<ProbeScript>,
    direct_ip: Option<String>,
    country: String,
    tor_probes: AtomicUsize,
    direct_probes: AtomicUsize,
    geolocations: AtomicUsize,
}

impl ScriptedProber {
    /// Answer Tor probes with `answers`, in order
    pub fn new(answers: &[Option<&str>]) -> Self {
        let answers = answers
            .iter()
            .map(|answer| answer.map(str::to_string))
            .collect();
        Self::with_script(ProbeScript::Queue {
            answers,
            last: None,
        })
    }

    /// Every Tor probe returns a new address (10.0.0.1, 10.0.0.2, ...)
    pub fn fresh_each_time() -> Self {
        Self::with_script(ProbeScript::Fresh { next: 1 })
    }

    fn with_script(script: ProbeScript) -> Self {
        Self {
            script: Mutex::new(script),
            direct_ip: Some("203.0.113.7".to_string()),
            country: "Iceland".to_string(),
            tor_probes: AtomicUsize::new(0),
            direct_probes: AtomicUsize::new(0),
            geolocations: AtomicUsize::new(0),
        }
    }

    pub fn tor_probe_count(&self) -> usize {
        self.tor_probes.load(Ordering::SeqCst)
    }

    pub fn direct_probe_count(&self) -> usize {
        self.direct_probes.load(Ordering::SeqCst)
    }

    pub fn geolocation_count(&self) -> usize {
        self.geolocations.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpProber for ScriptedProber {
    async fn probe(&self, route: Route) -> Option<String> {
        if route == Route::Direct {
            self.direct_probes.fetch_add(1, Ordering::SeqCst);
            return self.direct_ip.clone();
        }

        self.tor_probes.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        match &mut *script {
            ProbeScript::Queue { answers, last } => {
                if let Some(answer) = answers.pop_front() {
                    *last = answer.clone();
                    answer
                } else {
                    last.clone()
                }
            }
            ProbeScript::Fresh { next } => {
                let ip = format!("10.0.0.{}", next);
                *next += 1;
                Some(ip)
            }
        }
    }

    async fn geolocate(&self, _ip: &str) -> String {
        self.geolocations.fetch_add(1, Ordering::SeqCst);
        self.country.clone()
    }
}

/// A ControlChannel that succeeds, fails, or is unavailable
pub struct MockControl {
    available: bool,
    fail: bool,
    delay: Duration,
    new_identity_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl MockControl {
    pub fn working() -> Self {
        Self::build(true, false)
    }

    /// Available, but every NEWNYM fails authentication
    pub fn failing_auth() -> Self {
        Self::build(true, true)
    }

    pub fn unavailable() -> Self {
        Self::build(false, false)
    }

    /// Available, but each NEWNYM exchange takes `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::build(true, false)
        }
    }

    fn build(available: bool, fail: bool) -> Self {
        Self {
            available,
            fail,
            delay: Duration::ZERO,
            new_identity_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    pub fn new_identity_count(&self) -> usize {
        self.new_identity_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ControlChannel for MockControl {
    fn supports_control_channel(&self) -> bool {
        self.available
    }

    async fn new_identity(&self) -> Result<()> {
        self.new_identity_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            Err(Error::auth("515 Authentication failed: Password did not match"))
        } else {
            Ok(())
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// How MockService answers reload requests
#[derive(Clone, Copy)]
pub enum ReloadBehavior {
    Dispatch,
    Manual,
    Fail,
}

/// A ServiceController that tracks calls
pub struct MockService {
    platform: Platform,
    running: bool,
    hang_on_stop: bool,
    reload_behavior: ReloadBehavior,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    reload_calls: AtomicUsize,
    terminate_calls: AtomicUsize,
}

impl MockService {
    pub fn new(reload_behavior: ReloadBehavior) -> Self {
        Self {
            platform: Platform::Linux,
            running: true,
            hang_on_stop: false,
            reload_behavior,
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            reload_calls: AtomicUsize::new(0),
            terminate_calls: AtomicUsize::new(0),
        }
    }

    pub fn stopped(mut self) -> Self {
        self.running = false;
        self
    }

    /// `stop()` never returns, like a service manager waiting on a password prompt
    pub fn hanging_on_stop(mut self) -> Self {
        self.hang_on_stop = true;
        self
    }

    pub fn start_count(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn reload_count(&self) -> usize {
        self.reload_calls.load(Ordering::SeqCst)
    }

    pub fn terminate_count(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ServiceController for MockService {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn is_installed(&self) -> bool {
        true
    }

    async fn is_running(&self) -> bool {
        self.running
    }

    async fn start(&self) -> Result<ServiceAction> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ServiceAction::Dispatched)
    }

    async fn stop(&self) -> Result<ServiceAction> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_stop {
            std::future::pending::<()>().await;
        }
        Ok(ServiceAction::Dispatched)
    }

    async fn reload(&self) -> Result<ServiceAction> {
        self.reload_calls.fetch_add(1, Ordering::SeqCst);
        match self.reload_behavior {
            ReloadBehavior::Dispatch => Ok(ServiceAction::Dispatched),
            ReloadBehavior::Manual => Ok(ServiceAction::manual(
                "Restart Tor Browser manually for a new circuit",
            )),
            ReloadBehavior::Fail => Err(Error::service("systemctl exited with status 1")),
        }
    }

    async fn terminate_stray_processes(&self) -> Result<usize> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

/// Configuration used by contract tests
pub fn test_config() -> TornetConfig {
    let mut config = TornetConfig::new();
    config.rotation.max_retries = 3;
    config.rotation.settle_secs = 5;
    config.schedule.interval_secs = 60;
    config.rotation.event_channel_capacity = 1000;
    config
}

/// Everything a contract test needs to drive the engine
pub struct Harness {
    pub engine: RotationEngine,
    pub events: mpsc::Receiver<EngineEvent>,
    pub lifecycle: Lifecycle,
}

/// Wire doubles into an engine and lifecycle the way the binary does
pub fn harness(
    prober: Arc<ScriptedProber>,
    control: Arc<MockControl>,
    service: Arc<MockService>,
    config: &TornetConfig,
) -> Harness {
    let driver = CircuitRotationDriver::new(control, service, config.rotation.sticky_fallback);
    let lifecycle = Lifecycle::for_driver(&driver);
    let (engine, events) =
        RotationEngine::new(prober, driver, config, lifecycle.cancellation_token())
            .expect("engine construction succeeds");

    Harness {
        engine,
        events,
        lifecycle,
    }
}

/// Drain every event currently buffered
pub fn drain(events: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
