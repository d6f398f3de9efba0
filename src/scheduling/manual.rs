use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::time::Duration;
use tracing::debug;

use super::{validate_interval, ScheduleHandle, Scheduler, TriggerCallback};
use crate::error::{FleetSyncError, FleetSyncResult};

struct Registration {
    handle: ScheduleHandle,
    callback: TriggerCallback,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Scheduler whose ticks are fired explicitly
///
/// Intervals are recorded but never acted on. Tests call [`fire`] to run a
/// tick to completion, or [`trigger`] to obtain the tick's future and drive
/// several ticks concurrently.
///
/// [`fire`]: ManualScheduler::fire
/// [`trigger`]: ManualScheduler::trigger
#[derive(Debug, Default)]
pub struct ManualScheduler {
    registrations: Mutex<Vec<Registration>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Future for one tick of the named registration
    pub fn trigger(&self, name: &str) -> FleetSyncResult<BoxFuture<'static, ()>> {
        let registrations = self.registrations.lock();
        let registration = registrations
            .iter()
            .find(|r| r.handle.name() == name && r.handle.is_active())
            .ok_or_else(|| {
                FleetSyncError::SchedulerError(format!("no active registration named {name}"))
            })?;

        debug!(registration = %name, "Manual tick");
        Ok((registration.callback)())
    }

    /// Run one tick of the named registration to completion
    pub async fn fire(&self, name: &str) -> FleetSyncResult<()> {
        let tick = self.trigger(name)?;
        tick.await;
        Ok(())
    }

    /// Run one tick of every active registration, in registration order
    pub async fn fire_all(&self) {
        let ticks: Vec<BoxFuture<'static, ()>> = self
            .registrations
            .lock()
            .iter()
            .filter(|r| r.handle.is_active())
            .map(|r| (r.callback)())
            .collect();

        for tick in ticks {
            tick.await;
        }
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.registrations
            .lock()
            .iter()
            .filter(|r| r.handle.is_active())
            .map(|r| r.handle.name().to_string())
            .collect()
    }

    pub fn interval_of(&self, name: &str) -> Option<Duration> {
        self.registrations
            .lock()
            .iter()
            .find(|r| r.handle.name() == name)
            .map(|r| r.handle.interval())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(
        &self,
        name: &str,
        interval: Duration,
        callback: TriggerCallback,
    ) -> FleetSyncResult<ScheduleHandle> {
        validate_interval(name, interval)?;

        let handle = ScheduleHandle::new(name, interval);
        self.registrations.lock().push(Registration {
            handle: handle.clone(),
            callback,
        });
        Ok(handle)
    }

    fn shutdown(&self) {
        for registration in self.registrations.lock().iter() {
            registration.handle.cancel();
        }
    }
}
