//! In-memory resource manager for exercising pools without a backend
//!
//! [`MockManager`] hands out [`MockResource`]s that answer `PING` with
//! `PONG`, counts every connect, close and destruction, and can be told to
//! fail connects or health checks.

use crate::config::Endpoint;
use crate::manager::ResourceManager;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
#[error("connection to {host}:{port} refused")]
pub struct MockError {
    pub host: String,
    pub port: u16,
}

/// Counters shared by a manager and every resource it created
#[derive(Debug, Default)]
pub struct MockStats {
    connects: AtomicUsize,
    closes: AtomicUsize,
    health_checks: AtomicUsize,
    destroyed: AtomicUsize,
}

impl MockStats {
    /// Successful connects, reconnects included
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Closes of connected resources
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Resources dropped
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// A fake connection
#[derive(Debug)]
pub struct MockResource {
    id: usize,
    connected: bool,
    commands: usize,
    stats: Arc<MockStats>,
}

impl MockResource {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Commands executed since the resource was created
    pub fn commands(&self) -> usize {
        self.commands
    }

    /// Answer a command: `PING` gets `PONG`, anything else is echoed
    pub fn execute(&mut self, command: &str) -> String {
        self.commands += 1;
        if !self.connected {
            return "ERR not connected".to_string();
        }
        match command {
            "PING" => "PONG".to_string(),
            other => other.to_string(),
        }
    }
}

impl Drop for MockResource {
    fn drop(&mut self) {
        self.stats.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Resource manager backed by [`MockResource`]s
///
/// # Examples
///
/// ```
/// use esox_resourcepool::testing::MockManager;
/// use esox_resourcepool::{Endpoint, ResourceManager};
/// use std::time::Duration;
///
/// let manager = MockManager::new();
/// let mut res = manager.connect(&Endpoint::default(), Duration::from_secs(1)).unwrap();
/// assert!(manager.is_healthy(&mut res));
///
/// manager.fail_health_checks(1);
/// assert!(!manager.is_healthy(&mut res));
/// assert!(manager.is_healthy(&mut res));
/// ```
#[derive(Debug)]
pub struct MockManager {
    stats: Arc<MockStats>,
    next_id: AtomicUsize,
    /// Connects still allowed to succeed before failing
    connect_budget: AtomicUsize,
    limit_connects: AtomicBool,
    failing_health_checks: AtomicUsize,
    panicking_health_checks: AtomicUsize,
    connect_delay: Duration,
}

impl Default for MockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockManager {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(MockStats::default()),
            next_id: AtomicUsize::new(1),
            connect_budget: AtomicUsize::new(0),
            limit_connects: AtomicBool::new(false),
            failing_health_checks: AtomicUsize::new(0),
            panicking_health_checks: AtomicUsize::new(0),
            connect_delay: Duration::ZERO,
        }
    }

    /// Make every connect take `delay`
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }

    /// Let `count` more connects succeed, then refuse all others
    pub fn fail_connects_after(&self, count: usize) {
        self.connect_budget.store(count, Ordering::SeqCst);
        self.limit_connects.store(true, Ordering::SeqCst);
    }

    /// Stop refusing connects
    pub fn allow_connects(&self) {
        self.limit_connects.store(false, Ordering::SeqCst);
    }

    /// Fail the next `count` health checks
    pub fn fail_health_checks(&self, count: usize) {
        self.failing_health_checks.store(count, Ordering::SeqCst);
    }

    /// Panic in the next `count` health checks
    pub fn panic_health_checks(&self, count: usize) {
        self.panicking_health_checks.store(count, Ordering::SeqCst);
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn admit_connect(&self, endpoint: &Endpoint) -> Result<(), MockError> {
        if !self.connect_delay.is_zero() {
            std::thread::sleep(self.connect_delay);
        }
        if !self.limit_connects.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.connect_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| MockError {
                host: endpoint.host.clone(),
                port: endpoint.port,
            })
    }
}

impl ResourceManager for MockManager {
    type Resource = MockResource;
    type Error = MockError;

    fn connect(&self, endpoint: &Endpoint, _timeout: Duration) -> Result<MockResource, MockError> {
        self.admit_connect(endpoint)?;
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockResource {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            connected: true,
            commands: 0,
            stats: Arc::clone(&self.stats),
        })
    }

    fn is_healthy(&self, resource: &mut MockResource) -> bool {
        self.stats.health_checks.fetch_add(1, Ordering::SeqCst);
        if Self::take_one(&self.panicking_health_checks) {
            panic!("health check of resource {} blew up", resource.id);
        }
        let injected_failure = Self::take_one(&self.failing_health_checks);
        !injected_failure && resource.execute("PING") == "PONG"
    }

    fn close(&self, resource: &mut MockResource) {
        if resource.connected {
            resource.connected = false;
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    // Reconnects in place so a repaired resource keeps its id.
    fn reconnect(
        &self,
        resource: &mut MockResource,
        endpoint: &Endpoint,
        _timeout: Duration,
    ) -> Result<(), MockError> {
        self.close(resource);
        self.admit_connect(endpoint)?;
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        resource.connected = true;
        Ok(())
    }
}
