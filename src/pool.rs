//! Core resource pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::handle::PooledResource;
use crate::health::HealthStatus;
use crate::maintenance;
use crate::manager::ResourceManager;
use crate::metrics::{MetricsExporter, MetricsTracker, Occupancy, PoolMetrics};
use crate::queue::BoundedQueue;

use crossbeam::channel::{self, Sender};
use crossbeam::utils::Backoff;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// State shared by the pool, its maintenance thread and (weakly) every
/// outstanding handle
pub(crate) struct Shared<M: ResourceManager> {
    pub manager: M,
    pub config: PoolConfiguration,
    pub stopped: AtomicBool,
    /// Resources sitting in `ready`, counted before they are pushed
    pub idle_count: AtomicUsize,
    /// Resources owned by the pool, checked-out ones included
    pub capacity: AtomicUsize,
    pub checked_out: AtomicUsize,
    pub resting: BoundedQueue<M::Resource>,
    pub ready: BoundedQueue<M::Resource>,
    pub metrics: MetricsTracker,
}

impl<M: ResourceManager> Shared<M> {
    /// Hand a borrowed resource back for re-validation
    pub fn return_resource(&self, resource: M::Resource) {
        self.checked_out.fetch_sub(1, Ordering::AcqRel);
        MetricsTracker::incr(&self.metrics.total_returned);

        if let Err(resource) = self.resting.try_enqueue(resource) {
            MetricsTracker::incr(&self.metrics.dropped_returns);
            tracing::warn!("resting queue full, discarding returned resource");
            self.discard(resource);
        }
    }

    /// Put a resource back into `resting`, discarding it if there is no room
    pub fn requeue(&self, resource: M::Resource) {
        if let Err(resource) = self.resting.try_enqueue(resource) {
            tracing::warn!("resting queue full, discarding resource");
            self.discard(resource);
        }
    }

    /// Close a resource and free its capacity slot
    pub fn discard(&self, mut resource: M::Resource) {
        self.manager.close(&mut resource);
        self.capacity.fetch_sub(1, Ordering::AcqRel);
    }

    /// Stop tracking a checked-out resource
    pub fn forget(&self) {
        self.checked_out.fetch_sub(1, Ordering::AcqRel);
        self.capacity.fetch_sub(1, Ordering::AcqRel);
        MetricsTracker::incr(&self.metrics.detached);
    }

    /// Claim a ready-set slot if the idle cap allows it
    pub fn try_reserve_idle(&self) -> bool {
        let max_idle = self.config.max_idle;
        self.idle_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |idle| {
                (idle < max_idle).then_some(idle + 1)
            })
            .is_ok()
    }

    fn occupancy(&self) -> Occupancy {
        Occupancy {
            capacity: self.capacity.load(Ordering::Acquire),
            max_capacity: self.config.max_capacity,
            ready: self.ready.len(),
            resting: self.resting.len(),
            checked_out: self.checked_out.load(Ordering::Acquire),
        }
    }
}

impl<M: ResourceManager> Drop for Shared<M> {
    fn drop(&mut self) {
        let mut closed = 0usize;
        for queue in [&self.ready, &self.resting] {
            while let Some(mut resource) = queue.try_dequeue() {
                self.manager.close(&mut resource);
                closed += 1;
            }
        }
        tracing::debug!(closed, "released pooled resources");
    }
}

/// Thread-safe pool of long-lived resources
///
/// Resources are connected through a [`ResourceManager`], verified by a
/// background maintenance thread and handed out as [`PooledResource`]s that
/// return themselves when dropped.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::testing::MockManager;
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_init_capacity(2)
///     .with_max_capacity(8)
///     .with_max_idle_timeout(Duration::from_millis(1));
/// let pool = ResourcePool::new(MockManager::new(), config).unwrap();
///
/// {
///     let mut conn = pool.borrow();
///     assert_eq!(conn.execute("PING"), "PONG");
///     // Returned to the pool when `conn` goes out of scope
/// }
/// ```
pub struct ResourcePool<M: ResourceManager> {
    shared: Arc<Shared<M>>,
    shutdown: Option<Sender<()>>,
    maintenance: Option<JoinHandle<()>>,
}

impl<M: ResourceManager> ResourcePool<M> {
    /// Create a pool, connecting `init_capacity` resources before returning
    ///
    /// Fails if the configuration is invalid or any warm-up connect fails;
    /// resources connected before the failure are closed.
    pub fn new(manager: M, config: PoolConfiguration) -> PoolResult<Self> {
        config.validate()?;

        let resting = BoundedQueue::new(config.queue_capacity())?;
        let ready = BoundedQueue::new(config.queue_capacity())?;

        let mut warm = Vec::with_capacity(config.init_capacity);
        for _ in 0..config.init_capacity {
            match manager.connect(&config.endpoint, config.connect_timeout) {
                Ok(resource) => warm.push(resource),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        connected = warm.len(),
                        "warm-up connect failed"
                    );
                    for mut resource in warm {
                        manager.close(&mut resource);
                    }
                    return Err(PoolError::connect(e));
                }
            }
        }

        let mut capacity = 0;
        for resource in warm {
            match resting.try_enqueue(resource) {
                Ok(()) => capacity += 1,
                Err(mut resource) => manager.close(&mut resource),
            }
        }

        let shared = Arc::new(Shared {
            manager,
            config,
            stopped: AtomicBool::new(false),
            idle_count: AtomicUsize::new(0),
            capacity: AtomicUsize::new(capacity),
            checked_out: AtomicUsize::new(0),
            resting,
            ready,
            metrics: MetricsTracker::new(),
        });

        let (shutdown, signal) = channel::bounded::<()>(0);
        let worker = Arc::clone(&shared);
        let maintenance = thread::Builder::new()
            .name("resourcepool-maintenance".to_string())
            .spawn(move || maintenance::run(worker, signal))
            .map_err(|e| PoolError::Maintenance(e.to_string()))?;

        tracing::info!(
            init_capacity = capacity,
            max_capacity = shared.config.max_capacity,
            max_idle = shared.config.max_idle,
            "resource pool started"
        );

        Ok(Self {
            shared,
            shutdown: Some(shutdown),
            maintenance: Some(maintenance),
        })
    }

    /// Borrow a resource, waiting as long as it takes for one to be ready
    ///
    /// There is no deadline; see [`borrow_timeout`](Self::borrow_timeout)
    /// and [`borrow_async`](Self::borrow_async) for bounded waits.
    pub fn borrow(&self) -> PooledResource<M> {
        if let Some(resource) = self.try_borrow() {
            return resource;
        }
        MetricsTracker::incr(&self.shared.metrics.empty_waits);

        let backoff = Backoff::new();
        loop {
            if let Some(resource) = self.try_borrow() {
                return resource;
            }
            Self::wait(&backoff);
        }
    }

    /// Try to borrow a ready resource without waiting
    pub fn try_borrow(&self) -> Option<PooledResource<M>> {
        let resource = self.shared.ready.try_dequeue()?;

        self.shared.idle_count.fetch_sub(1, Ordering::AcqRel);
        self.shared.checked_out.fetch_add(1, Ordering::AcqRel);
        MetricsTracker::incr(&self.shared.metrics.total_borrowed);
        tracing::trace!("resource borrowed");

        Some(PooledResource::new(resource, Arc::downgrade(&self.shared)))
    }

    /// Borrow a resource, giving up after `timeout`
    pub fn borrow_timeout(&self, timeout: Duration) -> PoolResult<PooledResource<M>> {
        if let Some(resource) = self.try_borrow() {
            return Ok(resource);
        }
        MetricsTracker::incr(&self.shared.metrics.empty_waits);

        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        loop {
            if let Some(resource) = self.try_borrow() {
                return Ok(resource);
            }
            if Instant::now() >= deadline {
                return Err(PoolError::Timeout(timeout));
            }
            Self::wait(&backoff);
        }
    }

    /// Borrow a resource asynchronously with the configured timeout
    pub async fn borrow_async(&self) -> PoolResult<PooledResource<M>> {
        let timeout = self
            .shared
            .config
            .operation_timeout
            .unwrap_or(Duration::from_secs(30));

        tokio::time::timeout(timeout, async {
            if let Some(resource) = self.try_borrow() {
                return resource;
            }
            MetricsTracker::incr(&self.shared.metrics.empty_waits);
            loop {
                match self.try_borrow() {
                    Some(resource) => return resource,
                    None => {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    }
                }
            }
        })
        .await
        .map_err(|_| PoolError::Timeout(timeout))
    }

    /// Return a borrowed resource explicitly
    ///
    /// Equivalent to dropping the handle. A handle issued by another pool
    /// goes back to that pool.
    pub fn return_resource(&self, resource: PooledResource<M>) {
        if PooledResource::belongs_to(&resource, &self.shared) {
            self.shared.return_resource(PooledResource::take(resource));
        } else {
            drop(resource);
        }
    }

    /// Get health status
    pub fn health_status(&self) -> HealthStatus {
        let occupancy = self.shared.occupancy();
        HealthStatus::new(
            occupancy.ready,
            occupancy.resting,
            occupancy.checked_out,
            occupancy.capacity,
            occupancy.max_capacity,
        )
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.shared.metrics.get_metrics(self.shared.occupancy())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Resources owned by the pool, checked-out ones included
    pub fn capacity(&self) -> usize {
        self.shared.capacity.load(Ordering::Acquire)
    }

    /// Resources verified and waiting to be borrowed
    pub fn ready_count(&self) -> usize {
        self.shared.ready.len()
    }

    /// Resources waiting for a health check
    pub fn resting_count(&self) -> usize {
        self.shared.resting.len()
    }

    /// Ready-set slots currently claimed
    pub fn idle_count(&self) -> usize {
        self.shared.idle_count.load(Ordering::Acquire)
    }

    /// Resources held by borrowers
    pub fn checked_out_count(&self) -> usize {
        self.shared.checked_out.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.shared.config
    }

    pub fn manager(&self) -> &M {
        &self.shared.manager
    }

    fn wait(backoff: &Backoff) {
        if backoff.is_completed() {
            thread::sleep(Duration::from_micros(50));
        } else {
            backoff.snooze();
        }
    }
}

impl<M: ResourceManager> Drop for ResourcePool<M> {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::Release);
        // Disconnecting the channel wakes the maintenance thread early.
        drop(self.shutdown.take());

        if let Some(maintenance) = self.maintenance.take()
            && maintenance.join().is_err()
        {
            tracing::error!("maintenance thread panicked");
        }

        tracing::info!(
            capacity = self.shared.capacity.load(Ordering::Acquire),
            checked_out = self.shared.checked_out.load(Ordering::Acquire),
            "resource pool stopped"
        );
    }
}
