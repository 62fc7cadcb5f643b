//! Contract Test: Rotation Strategy Fallback
//!
//! Constraints verified:
//! - The control signal is preferred whenever the channel is available
//! - A control failure falls back to a service reload within the same call
//! - Fallback is not sticky unless configured
//! - Platforms without an automatable reload report manual action, not success

mod common;

use common::*;
use std::sync::Arc;
use tornet_core::{CircuitRotationDriver, EngineEvent, RotationStrategy};

#[tokio::test]
async fn control_signal_is_preferred() {
    let control = Arc::new(MockControl::working());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let driver = CircuitRotationDriver::new(control.clone(), service.clone(), false);

    let rotation = driver.rotate_with_report().await;

    assert!(rotation.issued);
    assert_eq!(rotation.strategy, RotationStrategy::ControlSignal);
    assert_eq!(rotation.downgrade_reason, None);
    assert_eq!(control.new_identity_count(), 1);
    assert_eq!(service.reload_count(), 0);
}

#[tokio::test]
async fn auth_failure_falls_back_to_reload_in_same_call() {
    let control = Arc::new(MockControl::failing_auth());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let driver = CircuitRotationDriver::new(control.clone(), service.clone(), false);

    let issued = driver.rotate().await;

    assert!(issued, "reload dispatch counts as an issued rotation");
    assert_eq!(control.new_identity_count(), 1);
    assert_eq!(service.reload_count(), 1);
}

#[tokio::test]
async fn downgrade_reason_is_reported() {
    let control = Arc::new(MockControl::failing_auth());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let driver = CircuitRotationDriver::new(control, service, false);

    let rotation = driver.rotate_with_report().await;

    assert_eq!(rotation.strategy, RotationStrategy::ServiceReload);
    let reason = rotation.downgrade_reason.expect("downgrade reason recorded");
    assert!(reason.contains("Authentication failed"), "got: {}", reason);
}

#[tokio::test]
async fn unavailable_control_goes_straight_to_reload() {
    let control = Arc::new(MockControl::unavailable());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let driver = CircuitRotationDriver::new(control.clone(), service.clone(), false);

    let rotation = driver.rotate_with_report().await;

    assert!(rotation.issued);
    assert_eq!(rotation.downgrade_reason, None);
    assert_eq!(control.new_identity_count(), 0);
    assert_eq!(service.reload_count(), 1);
}

#[tokio::test]
async fn fallback_is_not_sticky_by_default() {
    let control = Arc::new(MockControl::failing_auth());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let driver = CircuitRotationDriver::new(control.clone(), service.clone(), false);

    for _ in 0..3 {
        assert!(driver.rotate().await);
    }

    assert_eq!(control.new_identity_count(), 3, "control retried on every call");
    assert_eq!(service.reload_count(), 3);
    assert!(!driver.control_suspended());
}

#[tokio::test]
async fn sticky_fallback_stops_retrying_control() {
    let control = Arc::new(MockControl::failing_auth());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let driver = CircuitRotationDriver::new(control.clone(), service.clone(), true);

    for _ in 0..3 {
        assert!(driver.rotate().await);
    }

    assert_eq!(control.new_identity_count(), 1, "control tried once");
    assert_eq!(service.reload_count(), 3);
    assert!(driver.control_suspended());
}

#[tokio::test]
async fn manual_platform_reports_not_issued_with_guidance() {
    let control = Arc::new(MockControl::unavailable());
    let service = Arc::new(MockService::new(ReloadBehavior::Manual));
    let driver = CircuitRotationDriver::new(control, service, false);

    let rotation = driver.rotate_with_report().await;

    assert!(!rotation.issued);
    assert!(rotation.guidance.is_some());
}

#[tokio::test]
async fn failed_reload_is_not_issued() {
    let control = Arc::new(MockControl::failing_auth());
    let service = Arc::new(MockService::new(ReloadBehavior::Fail));
    let driver = CircuitRotationDriver::new(control, service.clone(), false);

    assert!(!driver.rotate().await);
    assert_eq!(service.reload_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn engine_reports_downgrade_and_keeps_verifying() {
    let prober = Arc::new(ScriptedProber::new(&[Some("1.2.3.4"), Some("5.6.7.8")]));
    let control = Arc::new(MockControl::failing_auth());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let mut h = harness(prober, control, service.clone(), &test_config());

    let result = h.engine.change_ip().await;

    assert_eq!(result.as_deref(), Some("5.6.7.8"));
    assert_eq!(service.reload_count(), 1);

    let events = drain(&mut h.events);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::StrategyDowngraded { .. })));
    assert!(events.contains(&EngineEvent::RotationIssued {
        strategy: RotationStrategy::ServiceReload,
        issued: true,
    }));
}

#[tokio::test(start_paused = true)]
async fn unissued_rotation_still_probes() {
    // The rotate() result is informational; verification always runs
    let prober = Arc::new(ScriptedProber::new(&[Some("1.2.3.4")]));
    let control = Arc::new(MockControl::unavailable());
    let service = Arc::new(MockService::new(ReloadBehavior::Manual));
    let mut h = harness(prober.clone(), control, service, &test_config());

    let result = h.engine.change_ip().await;

    assert_eq!(result, None);
    assert_eq!(prober.tor_probe_count(), 4);
    assert!(drain(&mut h.events)
        .iter()
        .any(|e| matches!(e, EngineEvent::ManualActionRequired { .. })));
}
