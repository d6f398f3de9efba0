//! Test doubles for provider fetchers.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use fleet_sync::error::FetchError;
use fleet_sync::models::{AssignmentRecord, TelemetrySample};
use fleet_sync::provider::RecordFetcher;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Fetcher replaying a fixed script of results, then `Ok(vec![])` forever
#[derive(Debug)]
pub struct ScriptedFetcher<R> {
    name: String,
    script: Mutex<VecDeque<Result<Vec<R>, FetchError>>>,
    calls: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
}

impl<R: Clone + Send + Sync + Debug + 'static> ScriptedFetcher<R> {
    pub fn new(name: &str, script: Vec<Result<Vec<R>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            call_times: Mutex::new(Vec::new()),
        })
    }

    /// Append more results to the script
    pub fn push(&self, result: Result<Vec<R>, FetchError>) {
        self.script.lock().push_back(result);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().clone()
    }
}

#[async_trait]
impl<R: Clone + Send + Sync + Debug + 'static> RecordFetcher<R> for ScriptedFetcher<R> {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<R>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().push(Instant::now());
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Fetcher that blocks inside `fetch` until released
#[derive(Debug)]
pub struct GatedFetcher {
    name: String,
    pub entered: Notify,
    pub release: Notify,
    calls: AtomicU32,
}

impl GatedFetcher {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordFetcher<TelemetrySample> for GatedFetcher {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<TelemetrySample>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![telemetry("v1", &self.name)])
    }
}

/// Fetcher whose `fetch` never completes
#[derive(Debug)]
pub struct StalledFetcher {
    name: String,
    calls: AtomicU32,
}

impl StalledFetcher {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordFetcher<TelemetrySample> for StalledFetcher {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<TelemetrySample>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub fn telemetry(vehicle_id: &str, source_tag: &str) -> TelemetrySample {
    TelemetrySample::at_position(vehicle_id, 44.8125, 20.4612, Utc::now(), source_tag)
}

pub fn assignment(vehicle_id: &str, route_number: &str) -> AssignmentRecord {
    AssignmentRecord::new(
        vehicle_id,
        route_number,
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        1,
    )
}

pub fn unavailable(provider: &str) -> FetchError {
    FetchError::Unavailable {
        provider: provider.to_string(),
        reason: "503 Service Unavailable".to_string(),
    }
}

pub fn connection_refused(provider: &str) -> FetchError {
    FetchError::ConnectionRefused {
        provider: provider.to_string(),
        reason: "connection refused".to_string(),
    }
}

pub fn unauthorized(provider: &str) -> FetchError {
    FetchError::Unauthorized {
        provider: provider.to_string(),
        reason: "401 Unauthorized".to_string(),
    }
}
