//! Background maintenance: validation, growth and repair of pooled resources

use crate::manager::ResourceManager;
use crate::metrics::MetricsTracker;
use crate::pool::Shared;

use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// What a single maintenance tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    /// A healthy resource moved to the ready set
    Promoted,
    /// A healthy resource went back to resting because the idle cap is reached
    Requeued,
    /// A broken resource was reconnected and requeued
    Repaired,
    /// A new resource was connected
    Grown,
    /// Nothing to validate and no room to grow
    Idle,
}

#[derive(Error, Debug)]
pub(crate) enum MaintenanceError<E: std::error::Error + 'static> {
    #[error("reconnecting a broken resource failed: {0}")]
    Repair(#[source] E),

    #[error("connecting a new resource failed: {0}")]
    Grow(#[source] E),
}

/// Run ticks until the pool stops or the shutdown channel disconnects
pub(crate) fn run<M: ResourceManager>(shared: Arc<Shared<M>>, shutdown: Receiver<()>) {
    let span = tracing::debug_span!(
        "maintenance",
        max_capacity = shared.config.max_capacity,
        max_idle = shared.config.max_idle
    );
    let _enter = span.enter();

    while !shared.stopped.load(Ordering::Acquire) {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| tick(&shared))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                MetricsTracker::incr(&shared.metrics.maintenance_panics);
                tracing::error!(
                    panic = panic_message(payload.as_ref()),
                    capacity = shared.capacity.load(Ordering::Acquire),
                    "resource manager panicked during maintenance"
                );
                Ok(Tick::Idle)
            }
        };

        match outcome {
            Ok(Tick::Grown) => tracing::debug!(
                capacity = shared.capacity.load(Ordering::Acquire),
                "pool grew"
            ),
            Ok(Tick::Repaired) => tracing::debug!("broken resource reconnected"),
            Ok(outcome) => tracing::trace!(?outcome, "maintenance tick"),
            Err(e @ MaintenanceError::Repair(_)) => {
                MetricsTracker::incr(&shared.metrics.repair_failures);
                tracing::warn!(
                    error = %e,
                    capacity = shared.capacity.load(Ordering::Acquire),
                    "discarded broken resource"
                );
            }
            Err(e @ MaintenanceError::Grow(_)) => {
                MetricsTracker::incr(&shared.metrics.connect_failures);
                tracing::warn!(error = %e, "pool growth failed, retrying next tick");
            }
        }

        match shutdown.recv_timeout(shared.config.max_idle_timeout) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!("maintenance stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Capacity slot of a resource taken out of `resting`
///
/// Frees the slot when dropped armed, which also happens if the tick unwinds
/// while the resource is in hand, so growth can replace it.
struct CapacitySlot<'a> {
    capacity: &'a AtomicUsize,
    armed: bool,
}

impl<'a> CapacitySlot<'a> {
    fn new(capacity: &'a AtomicUsize) -> Self {
        Self { capacity, armed: true }
    }

    /// The resource went back into a queue and keeps its slot
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for CapacitySlot<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.capacity.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// One step of the maintenance loop
pub(crate) fn tick<M: ResourceManager>(
    shared: &Shared<M>,
) -> Result<Tick, MaintenanceError<M::Error>> {
    let config = &shared.config;

    let Some(mut resource) = shared.resting.try_dequeue() else {
        // Only this thread grows capacity, so check-then-add cannot overshoot.
        if shared.capacity.load(Ordering::Acquire) >= config.max_capacity {
            return Ok(Tick::Idle);
        }
        let resource = shared
            .manager
            .connect(&config.endpoint, config.connect_timeout)
            .map_err(MaintenanceError::Grow)?;
        shared.capacity.fetch_add(1, Ordering::AcqRel);
        shared.requeue(resource);
        return Ok(Tick::Grown);
    };
    let slot = CapacitySlot::new(&shared.capacity);

    if !shared.manager.is_healthy(&mut resource) {
        MetricsTracker::incr(&shared.metrics.health_check_failures);
        tracing::warn!("health check failed, reconnecting resource");

        return match shared
            .manager
            .reconnect(&mut resource, &config.endpoint, config.connect_timeout)
        {
            Ok(()) => {
                MetricsTracker::incr(&shared.metrics.repairs);
                slot.keep();
                shared.requeue(resource);
                Ok(Tick::Repaired)
            }
            Err(e) => {
                shared.manager.close(&mut resource);
                drop(slot);
                Err(MaintenanceError::Repair(e))
            }
        };
    }

    slot.keep();
    if !shared.try_reserve_idle() {
        shared.requeue(resource);
        return Ok(Tick::Requeued);
    }

    match shared.ready.try_enqueue(resource) {
        Ok(()) => Ok(Tick::Promoted),
        Err(resource) => {
            shared.idle_count.fetch_sub(1, Ordering::AcqRel);
            shared.requeue(resource);
            Ok(Tick::Requeued)
        }
    }
}
