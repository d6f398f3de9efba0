use parking_lot::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{validate_interval, ScheduleHandle, Scheduler, TriggerCallback};
use crate::error::{FleetSyncError, FleetSyncResult};

/// Scheduler backed by tokio intervals on a multi-threaded runtime
#[derive(Debug)]
pub struct TokioScheduler {
    runtime: Handle,
    loops: Mutex<Vec<(ScheduleHandle, JoinHandle<()>)>>,
}

impl TokioScheduler {
    /// Bind to the runtime of the calling context
    pub fn new() -> FleetSyncResult<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            FleetSyncError::SchedulerError(format!("no tokio runtime available: {e}"))
        })?;
        Ok(Self::with_handle(runtime))
    }

    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime,
            loops: Mutex::new(Vec::new()),
        }
    }

    /// Number of registrations still ticking
    pub fn active_registrations(&self) -> usize {
        self.loops
            .lock()
            .iter()
            .filter(|(handle, _)| handle.is_active())
            .count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(
        &self,
        name: &str,
        interval: Duration,
        callback: TriggerCallback,
    ) -> FleetSyncResult<ScheduleHandle> {
        validate_interval(name, interval)?;

        let handle = ScheduleHandle::new(name, interval);
        let loop_handle = handle.clone();
        let runtime = self.runtime.clone();

        info!(
            registration = %name,
            interval_ms = interval.as_millis() as u64,
            "⏱️ Scheduling periodic trigger"
        );

        let join = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while loop_handle.is_active() {
                ticker.tick().await;
                if !loop_handle.is_active() {
                    break;
                }

                // Each tick runs as its own task; a panicking callback only
                // poisons that task, never this loop.
                runtime.spawn(callback());
            }

            debug!(registration = %loop_handle.name(), "Periodic trigger stopped");
        });

        let mut loops = self.loops.lock();
        // Cancelled loops exit on their next tick; drop them now
        loops.retain(|(registered, join)| {
            if registered.is_active() {
                true
            } else {
                join.abort();
                false
            }
        });
        loops.push((handle.clone(), join));
        Ok(handle)
    }

    fn shutdown(&self) {
        let mut loops = self.loops.lock();
        info!(registrations = loops.len(), "Shutting down scheduler");

        for (handle, join) in loops.drain(..) {
            handle.cancel();
            join.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (handle, join) in self.loops.get_mut().drain(..) {
            handle.cancel();
            join.abort();
        }
    }
}
