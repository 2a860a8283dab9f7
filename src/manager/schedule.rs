use tokio::task::JoinHandle;

use crate::helpers::time::IMMEDIATE_DELAY_MS;

/// Timing state of the renewal loop.
///
/// Holds at most one timer. Arming a new one aborts the previous task,
/// together with any fetch it still has in flight.
#[derive(Debug)]
pub struct ScheduleState {
    pub delay_ms: u64,
    pub refreshing: bool,
    pending: Option<JoinHandle<()>>,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self {
            delay_ms: IMMEDIATE_DELAY_MS,
            refreshing: false,
            pending: None,
        }
    }
}

impl ScheduleState {
    pub fn replace_timer(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.pending.replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel(&mut self) {
        if let Some(previous) = self.pending.take() {
            previous.abort();
        }
    }

    /// Forget the timer that just fired without aborting it.
    /// Called from inside that timer's own task.
    pub fn release_fired(&mut self) {
        self.pending = None;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Back to "fetch immediately" with no timer and no forced refresh.
    pub fn reset(&mut self) {
        self.cancel();
        self.delay_ms = IMMEDIATE_DELAY_MS;
        self.refreshing = false;
    }
}

impl Drop for ScheduleState {
    fn drop(&mut self) {
        self.cancel();
    }
}
