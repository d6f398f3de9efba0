//! End-to-end polling cycles through the ingestion engine.

mod common;

use common::*;
use fleet_sync::clock::ManualClock;
use fleet_sync::config::{FallbackMode, FleetSyncConfig};
use fleet_sync::engine::IngestionEngine;
use fleet_sync::error::{FallbackError, FetchError};
use fleet_sync::health::HealthStatus;
use fleet_sync::models::{AssignmentRecord, TelemetrySample};
use fleet_sync::polling::{CycleOutcome, Poller, PollerConfig};
use fleet_sync::provider::RecordSink;
use fleet_sync::resilience::{
    CircuitBreakerConfig, CircuitState, FallbackCause, FallbackSource, RetryPolicy,
};
use fleet_sync::scheduling::ManualScheduler;
use fleet_sync::Correlator;
use std::sync::Arc;
use std::time::Duration;

type Fetchers = (
    Arc<ScriptedFetcher<TelemetrySample>>,
    Arc<ScriptedFetcher<AssignmentRecord>>,
);

fn fetchers(
    telemetry_script: Vec<Result<Vec<TelemetrySample>, fleet_sync::FetchError>>,
    assignment_script: Vec<Result<Vec<AssignmentRecord>, fleet_sync::FetchError>>,
) -> Fetchers {
    (
        ScriptedFetcher::new("telemetry", telemetry_script),
        ScriptedFetcher::new("assignments", assignment_script),
    )
}

#[tokio::test(start_paused = true)]
async fn test_two_transient_failures_then_success_reaches_correlator() {
    let clock = ManualClock::starting_now();
    let scheduler = Arc::new(ManualScheduler::new());
    let (gps, roster) = fetchers(
        vec![
            Err(unavailable("telemetry")),
            Err(connection_refused("telemetry")),
            Ok(vec![telemetry("bus-7", "telemetry")]),
        ],
        vec![Ok(vec![assignment("bus-7", "26")])],
    );

    let engine = IngestionEngine::builder(FleetSyncConfig::default())
        .telemetry_fetcher(gps.clone())
        .assignment_fetcher(roster.clone())
        .scheduler(scheduler.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    engine.start().unwrap();

    scheduler.fire("telemetry.poll").await.unwrap();

    let poller = engine.telemetry_poller().unwrap();
    assert_eq!(gps.calls(), 3);
    let times = gps.call_times();
    assert_eq!(times[1] - times[0], Duration::from_millis(500));
    assert_eq!(times[2] - times[1], Duration::from_millis(1000));

    assert_eq!(poller.run_state().poll_count(), 1);
    assert_eq!(poller.run_state().consecutive_failures(), 0);
    assert_eq!(poller.run_state().success_count(), 1);
    assert!(engine
        .correlator()
        .get("bus-7")
        .unwrap()
        .latest_telemetry
        .is_some());
    assert_eq!(engine.correlator().statistics().complete, 0);

    scheduler.fire("assignments.poll").await.unwrap();
    assert_eq!(engine.correlator().statistics().complete, 1);
    assert_eq!(roster.calls(), 1);
}

#[tokio::test]
async fn test_breaker_opens_at_half_failures_and_recovers_after_cooldown() {
    let clock = ManualClock::starting_now();
    let correlator = Arc::new(Correlator::new(clock.clone()));
    let sink: Arc<dyn RecordSink<TelemetrySample>> = correlator.clone();

    let mut script: Vec<Result<Vec<TelemetrySample>, _>> = Vec::new();
    script.extend((0..5).map(|_| Ok(Vec::new())));
    script.extend((0..5).map(|_| Err(unauthorized("telemetry"))));
    script.push(Ok(vec![telemetry("bus-1", "telemetry")]));
    let gps = ScriptedFetcher::new("telemetry", script);

    let poller = Poller::new(
        gps.clone(),
        sink,
        PollerConfig::default(),
        RetryPolicy::transient_only(1, Duration::from_millis(100)).unwrap(),
        CircuitBreakerConfig::for_provider(),
        clock.clone(),
    )
    .unwrap();

    for _ in 0..9 {
        poller.on_trigger().await;
    }
    assert_eq!(poller.breaker().state(), CircuitState::Closed);

    poller.on_trigger().await;
    assert_eq!(poller.breaker().state(), CircuitState::Open);
    assert_eq!(gps.calls(), 10);

    // Rejected without reaching the provider until the cooldown elapses
    let rejected = poller.on_trigger().await;
    assert!(matches!(
        rejected,
        CycleOutcome::Failed {
            cause: FallbackCause::CircuitOpen,
            ..
        }
    ));
    clock.advance(Duration::from_secs(59));
    poller.on_trigger().await;
    assert_eq!(gps.calls(), 10);
    assert_eq!(poller.run_state().rejected_count(), 2);

    clock.advance(Duration::from_secs(1));
    let trial = poller.on_trigger().await;

    assert_eq!(trial, CycleOutcome::Succeeded { records: 1 });
    assert_eq!(gps.calls(), 11);
    assert_eq!(poller.breaker().state(), CircuitState::Closed);
    assert_eq!(poller.run_state().poll_count(), 13);
    assert!(correlator.get("bus-1").is_some());
}

#[tokio::test]
async fn test_cache_fallback_does_not_refresh_correlation() {
    let clock = ManualClock::starting_now();
    let scheduler = Arc::new(ManualScheduler::new());
    let mut config = FleetSyncConfig::default();
    config.telemetry_provider.fallback = FallbackMode::Cache;

    let (gps, roster) = fetchers(
        vec![
            Ok(vec![telemetry("bus-3", "telemetry")]),
            Err(unauthorized("telemetry")),
        ],
        Vec::new(),
    );

    let engine = IngestionEngine::builder(config)
        .telemetry_fetcher(gps)
        .assignment_fetcher(roster)
        .scheduler(scheduler)
        .clock(clock.clone())
        .build()
        .unwrap();
    let poller = engine.telemetry_poller().unwrap();

    assert_eq!(poller.on_trigger().await, CycleOutcome::Succeeded { records: 1 });
    let first_update = engine.correlator().get("bus-3").unwrap().last_updated_at;

    clock.advance(Duration::from_secs(600));
    let outcome = poller.on_trigger().await;

    assert!(matches!(
        outcome,
        CycleOutcome::Degraded {
            source: FallbackSource::Cache,
            records: 1,
            forwarded: false,
            cause: FallbackCause::Exhausted(_),
        }
    ));
    assert_eq!(
        engine.correlator().get("bus-3").unwrap().last_updated_at,
        first_update
    );
    assert_eq!(poller.run_state().fallback_count(), 1);
    assert_eq!(poller.run_state().consecutive_failures(), 1);
}

#[tokio::test]
async fn test_alternate_provider_covers_failed_primary() {
    let clock = ManualClock::starting_now();
    let mut config = FleetSyncConfig::default();
    config.telemetry_provider.fallback = FallbackMode::AlternateProvider;

    let (gps, roster) = fetchers(vec![Err(unauthorized("telemetry"))], Vec::new());
    let backup = ScriptedFetcher::new("gps_backup", vec![Ok(vec![telemetry("bus-2", "gps_backup")])]);

    let engine = IngestionEngine::builder(config)
        .telemetry_fetcher(gps)
        .assignment_fetcher(roster)
        .telemetry_alternate(backup.clone())
        .scheduler(Arc::new(ManualScheduler::new()))
        .clock(clock)
        .build()
        .unwrap();

    let outcome = engine.telemetry_poller().unwrap().on_trigger().await;

    assert_eq!(
        outcome,
        CycleOutcome::Degraded {
            cause: FallbackCause::Exhausted(unauthorized("telemetry")),
            source: FallbackSource::AlternateProvider("gps_backup".to_string()),
            records: 1,
            forwarded: true,
        }
    );
    assert_eq!(backup.calls(), 1);
    let entry = engine.correlator().get("bus-2").unwrap();
    assert_eq!(entry.latest_telemetry.unwrap().source_tag, "gps_backup");
}

#[tokio::test(start_paused = true)]
async fn test_stalled_alternate_times_out_and_frees_the_poller() {
    let clock = ManualClock::starting_now();
    let mut config = FleetSyncConfig::default();
    config.telemetry_provider.fallback = FallbackMode::AlternateProvider;
    config.telemetry_provider.fetch_timeout_ms = 5_000;
    config.telemetry_provider.retry.max_attempts = 1;

    let (gps, roster) = fetchers(vec![Err(unauthorized("telemetry"))], Vec::new());
    let backup = StalledFetcher::new("gps_backup");

    let engine = IngestionEngine::builder(config)
        .telemetry_fetcher(gps.clone())
        .assignment_fetcher(roster)
        .telemetry_alternate(backup.clone())
        .scheduler(Arc::new(ManualScheduler::new()))
        .clock(clock)
        .build()
        .unwrap();
    let poller = engine.telemetry_poller().unwrap();

    let started = tokio::time::Instant::now();
    let outcome = poller.on_trigger().await;

    assert_eq!(started.elapsed(), Duration::from_secs(5));
    match outcome {
        CycleOutcome::Failed {
            fallback_error:
                FallbackError::AlternateFailed {
                    alternate,
                    source: FetchError::Timeout { elapsed, .. },
                    ..
                },
            ..
        } => {
            assert_eq!(alternate, "gps_backup");
            assert_eq!(elapsed, Duration::from_secs(5));
        }
        other => panic!("expected an alternate timeout, got {other:?}"),
    }
    assert!(!poller.run_state().is_running());

    // The next tick runs a fresh cycle instead of being skipped
    assert_eq!(poller.on_trigger().await, CycleOutcome::Succeeded { records: 0 });
    assert_eq!(gps.calls(), 2);
    assert_eq!(backup.calls(), 1);
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped_not_queued() {
    let clock = ManualClock::starting_now();
    let scheduler = Arc::new(ManualScheduler::new());
    let gps = GatedFetcher::new("telemetry");
    let roster: Arc<ScriptedFetcher<AssignmentRecord>> = ScriptedFetcher::new("assignments", Vec::new());

    let engine = IngestionEngine::builder(FleetSyncConfig::default())
        .telemetry_fetcher(gps.clone())
        .assignment_fetcher(roster)
        .scheduler(scheduler.clone())
        .clock(clock)
        .build()
        .unwrap();
    engine.start().unwrap();

    let first = tokio::spawn(scheduler.trigger("telemetry.poll").unwrap());
    gps.entered.notified().await;

    scheduler.fire("telemetry.poll").await.unwrap();
    scheduler.fire("telemetry.poll").await.unwrap();

    let poller = engine.telemetry_poller().unwrap();
    assert_eq!(poller.run_state().skipped_count(), 2);
    assert!(poller.run_state().is_running());

    gps.release.notify_one();
    first.await.unwrap();

    assert_eq!(gps.calls(), 1);
    assert_eq!(poller.run_state().poll_count(), 1);
    assert!(!poller.run_state().is_running());

    // Health ticks read the counters without touching the flight flag
    scheduler.fire("telemetry.health").await.unwrap();
    assert_eq!(poller.health_check().skipped_count, 2);
}

#[tokio::test]
async fn test_sustained_failures_surface_only_in_health() {
    let clock = ManualClock::starting_now();
    let scheduler = Arc::new(ManualScheduler::new());
    let (gps, roster) = fetchers(
        (0..3).map(|_| Err(unauthorized("telemetry"))).collect(),
        vec![Ok(vec![assignment("bus-9", "7")])],
    );

    let engine = IngestionEngine::builder(FleetSyncConfig::default())
        .telemetry_fetcher(gps)
        .assignment_fetcher(roster)
        .scheduler(scheduler.clone())
        .clock(clock)
        .build()
        .unwrap();
    engine.start().unwrap();

    for _ in 0..3 {
        scheduler.fire("telemetry.poll").await.unwrap();
    }
    scheduler.fire("assignments.poll").await.unwrap();

    let report = engine.health_report();
    let telemetry_health = report
        .providers
        .iter()
        .find(|p| p.provider == "telemetry")
        .unwrap();
    let assignment_health = report
        .providers
        .iter()
        .find(|p| p.provider == "assignments")
        .unwrap();

    assert_eq!(telemetry_health.status, HealthStatus::Unhealthy);
    assert_eq!(telemetry_health.consecutive_failures, 3);
    assert_eq!(telemetry_health.success_rate, 0.0);
    assert_eq!(telemetry_health.breaker_state, CircuitState::Closed);
    assert_eq!(assignment_health.status, HealthStatus::Healthy);
    assert_eq!(report.status, HealthStatus::Unhealthy);
}

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_drives_cycles_until_shutdown() {
    let (gps, roster) = fetchers(Vec::new(), Vec::new());

    let engine = IngestionEngine::builder(FleetSyncConfig::default())
        .telemetry_fetcher(gps.clone())
        .assignment_fetcher(roster.clone())
        .build()
        .unwrap();
    engine.start().unwrap();

    // Telemetry ticks at 0s, 30s and 60s; assignments at 0s only
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(gps.calls(), 3);
    assert_eq!(roster.calls(), 1);

    engine.shutdown();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(gps.calls(), 3);
    assert_eq!(roster.calls(), 1);
}
