//! Tokio timer driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::bus::EventBus;

/// Spawns a task that fires due debounce timers and batch windows every
/// `period`. Abort the returned handle to stop it.
pub fn spawn_timer_driver(bus: Arc<EventBus>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let fired = bus.fire_due_timers();
            if fired > 0 {
                debug!(fired, "timer driver fired debounced emissions");
            }
        }
    })
}
