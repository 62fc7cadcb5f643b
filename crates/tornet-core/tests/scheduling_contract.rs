//! Contract Test: Scheduling Loop
//!
//! Constraints verified:
//! - A bounded schedule runs exactly `repeat_count` cycles, then returns
//! - Failed cycles do not stop the loop
//! - Each cycle waits the full interval before rotating
//! - Successful cycles are reported with geolocation

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use tornet_core::{EngineEvent, ScheduleConfig};

fn change_ip_calls(events: &[EngineEvent]) -> usize {
    // Every change_ip call starts at least one attempt; count first attempts
    events
        .iter()
        .filter(|e| matches!(e, EngineEvent::AttemptStarted { attempt: 1, .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn bounded_schedule_runs_exactly_repeat_count_cycles() {
    let prober = Arc::new(ScriptedProber::fresh_each_time());
    let control = Arc::new(MockControl::working());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let mut h = harness(prober, control.clone(), service, &test_config());

    let summary = h
        .engine
        .run(ScheduleConfig::new(60, 3))
        .await
        .expect("run succeeds");

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert!(!summary.cancelled);
    assert_eq!(control.new_identity_count(), 3);

    let events = drain(&mut h.events);
    assert_eq!(change_ip_calls(&events), 3);
    assert_eq!(
        events.last(),
        Some(&EngineEvent::Stopped {
            reason: "Schedule complete".to_string()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn failed_cycles_do_not_stop_the_loop() {
    let prober = Arc::new(ScriptedProber::new(&[Some("1.2.3.4")]));
    let control = Arc::new(MockControl::working());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let mut h = harness(prober, control.clone(), service, &test_config());

    let summary = h
        .engine
        .run(ScheduleConfig::new(30, 2))
        .await
        .expect("run succeeds");

    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(control.new_identity_count(), 6, "3 attempts per cycle");

    let failed_cycles = drain(&mut h.events)
        .iter()
        .filter(|e| matches!(e, EngineEvent::CycleFailed { .. }))
        .count();
    assert_eq!(failed_cycles, 2);
}

#[tokio::test(start_paused = true)]
async fn each_cycle_waits_the_interval() {
    let prober = Arc::new(ScriptedProber::fresh_each_time());
    let control = Arc::new(MockControl::working());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let h = harness(prober, control, service, &test_config());

    let started = tokio::time::Instant::now();
    h.engine
        .run(ScheduleConfig::new(60, 2))
        .await
        .expect("run succeeds");

    // Two intervals plus one settle pause per successful cycle
    assert!(started.elapsed() >= Duration::from_secs(2 * 60 + 2 * 5));
}

#[tokio::test(start_paused = true)]
async fn successful_cycles_are_reported_with_country() {
    let prober = Arc::new(ScriptedProber::fresh_each_time());
    let control = Arc::new(MockControl::working());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let mut h = harness(prober.clone(), control, service, &test_config());

    h.engine
        .run(ScheduleConfig::new(10, 2))
        .await
        .expect("run succeeds");

    let reported: Vec<_> = drain(&mut h.events)
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::IdentityReported { ip, country, .. } => Some((ip, country)),
            _ => None,
        })
        .collect();

    assert_eq!(reported.len(), 2);
    assert!(reported
        .iter()
        .all(|(_, country)| country.as_deref() == Some("Iceland")));
    assert_eq!(prober.geolocation_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn geolocation_can_be_disabled() {
    let prober = Arc::new(ScriptedProber::fresh_each_time());
    let control = Arc::new(MockControl::working());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let mut config = test_config();
    config.probe.geolocate = false;
    let h = harness(prober.clone(), control, service, &config);

    h.engine
        .run(ScheduleConfig::new(10, 1))
        .await
        .expect("run succeeds");

    assert_eq!(prober.geolocation_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_is_rejected() {
    let prober = Arc::new(ScriptedProber::fresh_each_time());
    let control = Arc::new(MockControl::working());
    let service = Arc::new(MockService::new(ReloadBehavior::Dispatch));
    let h = harness(prober, control.clone(), service, &test_config());

    let result = h.engine.run(ScheduleConfig::new(0, 1)).await;

    assert!(result.is_err());
    assert_eq!(control.new_identity_count(), 0);
}
