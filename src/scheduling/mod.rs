//! # Scheduling Facility
//!
//! Periodic trigger facility injected into the engine. A registration pairs an
//! interval with a callback; the facility invokes the callback once per tick.
//!
//! - [`TokioScheduler`] runs one interval loop per registration and spawns
//!   each tick's callback onto the tokio worker pool, so a slow callback never
//!   delays the next tick. Late ticks are skipped rather than bunched up.
//! - [`ManualScheduler`] fires registrations only when asked, for
//!   deterministic tests.
//!
//! Overlap between ticks of the same registration is the callback's concern
//! (pollers enforce single-flight themselves).

pub mod manual;
pub mod tokio_scheduler;

pub use manual::ManualScheduler;
pub use tokio_scheduler::TokioScheduler;

use futures::future::BoxFuture;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::FleetSyncResult;

/// Callback invoked on every tick of a registration
pub type TriggerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Periodic trigger facility
pub trait Scheduler: Send + Sync + Debug {
    /// Register `callback` to run every `interval`
    fn schedule(
        &self,
        name: &str,
        interval: Duration,
        callback: TriggerCallback,
    ) -> FleetSyncResult<ScheduleHandle>;

    /// Cancel every registration
    fn shutdown(&self);
}

/// Handle to a single registration; cancelling stops future ticks
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    id: Uuid,
    name: String,
    interval: Duration,
    active: Arc<AtomicBool>,
}

impl ScheduleHandle {
    pub(crate) fn new(name: &str, interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            interval,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Wrap an async closure into a [`TriggerCallback`]
pub fn trigger_fn<F, Fut>(f: F) -> TriggerCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(f()) })
}

pub(crate) fn validate_interval(name: &str, interval: Duration) -> FleetSyncResult<()> {
    if interval.is_zero() {
        return Err(crate::error::FleetSyncError::SchedulerError(format!(
            "interval for {name} must be greater than zero"
        )));
    }
    Ok(())
}
