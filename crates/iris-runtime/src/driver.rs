//! Background tasks that keep a [`GateArmRegistry`] moving.
//!
//! The registry itself is synchronous.  These loops give it a clock (the
//! periodic dependency sweep) and a single consumer of the inbound
//! hardware channel.  Both stop when the shutdown watch flips to `true`.

use std::sync::Arc;
use std::time::Duration;

use iris_hal::HardwareEvent;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::registry::GateArmRegistry;

/// Sweep every `period` until shutdown.
pub async fn run_sweep(
    registry: Arc<GateArmRegistry>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = period.as_millis() as u64, "dependency sweep started");
    loop {
        tokio::select! {
            _ = ticker.tick() => registry.sweep(),
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("dependency sweep stopped");
}

/// Feed controller reports into the registry until the channel closes or
/// shutdown is signalled.  Returns the number of events handled.
pub async fn run_hardware_events(
    registry: Arc<GateArmRegistry>,
    mut events: mpsc::UnboundedReceiver<HardwareEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut handled = 0;
    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(ev) => {
                    debug!(arm = ev.arm(), ?ev, "hardware event");
                    registry.handle_hardware_event(ev);
                    handled += 1;
                }
                None => break,
            },
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!(handled, "hardware event loop stopped");
    handled
}
