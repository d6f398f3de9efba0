//! # Structured Logging Module
//!
//! Environment-aware structured logging for the ingestion engine. Console
//! output is human readable by default; `FLEET_SYNC_LOG_FORMAT=json` switches
//! to one JSON object per line. `RUST_LOG` overrides the environment's
//! default level.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::correlation::SweepReport;
use crate::health::{EngineHealthReport, HealthStatus};
use crate::polling::CycleOutcome;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = json_requested();

        let console = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A subscriber installed by the host application takes precedence
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

fn get_environment() -> String {
    std::env::var("FLEET_SYNC_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "test" | "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn json_requested() -> bool {
    std::env::var("FLEET_SYNC_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Log the outcome of one polling cycle
pub fn log_cycle_outcome(provider: &str, outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Skipped => tracing::debug!(
            provider = %provider,
            outcome = outcome.label(),
            "📡 POLL_CYCLE"
        ),
        CycleOutcome::Succeeded { records } => tracing::info!(
            provider = %provider,
            outcome = outcome.label(),
            records = records,
            timestamp = %Utc::now().to_rfc3339(),
            "📡 POLL_CYCLE"
        ),
        CycleOutcome::Degraded {
            cause,
            records,
            forwarded,
            ..
        } => tracing::warn!(
            provider = %provider,
            outcome = outcome.label(),
            cause = %cause,
            records = records,
            forwarded = forwarded,
            timestamp = %Utc::now().to_rfc3339(),
            "📡 POLL_CYCLE"
        ),
        CycleOutcome::Failed {
            cause,
            fallback_error,
        } => tracing::error!(
            provider = %provider,
            outcome = outcome.label(),
            cause = %cause,
            fallback_error = %fallback_error,
            timestamp = %Utc::now().to_rfc3339(),
            "📡 POLL_CYCLE"
        ),
    }
}

/// Log a completed staleness sweep
pub fn log_sweep(report: &SweepReport) {
    tracing::info!(
        evicted = report.evicted,
        retained = report.retained,
        score = report.health.score,
        status = %report.health.status,
        timestamp = %Utc::now().to_rfc3339(),
        "🧹 CORRELATION_SWEEP"
    );
}

/// Log an engine health report at a level matching its status
pub fn log_health_report(report: &EngineHealthReport) {
    let providers: Vec<String> = report
        .providers
        .iter()
        .map(|p| format!("{}={}", p.provider, p.status))
        .collect();

    match report.status {
        HealthStatus::Healthy | HealthStatus::Unknown => tracing::info!(
            status = %report.status,
            providers = ?providers,
            correlation_score = report.correlation.score,
            "🩺 ENGINE_HEALTH"
        ),
        HealthStatus::Degraded | HealthStatus::Unhealthy => tracing::warn!(
            status = %report.status,
            providers = ?providers,
            correlation_score = report.correlation.score,
            "🩺 ENGINE_HEALTH"
        ),
    }
}
