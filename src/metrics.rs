//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metrics data for a pool
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
///     .with_max_capacity(4)
///     .with_max_idle_timeout(Duration::from_millis(1));
/// let pool = ResourcePool::new(MockManager::new(), config).unwrap();
///
/// {
///     let _res = pool.borrow();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.total_borrowed, 1);
///     assert_eq!(metrics.checked_out, 1);
/// }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolMetrics {
    /// Total resources handed to borrowers
    pub total_borrowed: usize,

    /// Total resources handed back by borrowers
    pub total_returned: usize,

    /// Borrow calls that found no ready resource on the first attempt
    pub empty_waits: usize,

    /// Health checks that failed during maintenance
    pub health_check_failures: usize,

    /// Broken resources successfully reconnected
    pub repairs: usize,

    /// Broken resources that could not be reconnected and were discarded
    pub repair_failures: usize,

    /// Connect attempts that failed while growing the pool
    pub connect_failures: usize,

    /// Returns discarded because the resting queue was full
    pub dropped_returns: usize,

    /// Resources taken out of pool management by their borrower
    pub detached: usize,

    /// Maintenance ticks aborted by a panicking resource manager
    pub maintenance_panics: usize,

    /// Resources currently owned by the pool, including checked-out ones
    pub capacity: usize,

    /// Configured ceiling on `capacity`
    pub max_capacity: usize,

    /// Verified resources waiting to be borrowed
    pub ready: usize,

    /// Resources waiting for a health check
    pub resting: usize,

    /// Resources currently held by borrowers
    pub checked_out: usize,

    /// Checked-out share of `max_capacity` (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("empty_waits".to_string(), self.empty_waits.to_string());
        metrics.insert("health_check_failures".to_string(), self.health_check_failures.to_string());
        metrics.insert("repairs".to_string(), self.repairs.to_string());
        metrics.insert("repair_failures".to_string(), self.repair_failures.to_string());
        metrics.insert("connect_failures".to_string(), self.connect_failures.to_string());
        metrics.insert("dropped_returns".to_string(), self.dropped_returns.to_string());
        metrics.insert("detached".to_string(), self.detached.to_string());
        metrics.insert("maintenance_panics".to_string(), self.maintenance_panics.to_string());
        metrics.insert("capacity".to_string(), self.capacity.to_string());
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics.insert("ready".to_string(), self.ready.to_string());
        metrics.insert("resting".to_string(), self.resting.to_string());
        metrics.insert("checked_out".to_string(), self.checked_out.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::testing::MockManager;
    /// use esox_resourcepool::{PoolConfiguration, ResourcePool};
    /// use std::collections::HashMap;
    ///
    /// let config = PoolConfiguration::new().with_init_capacity(1).with_max_capacity(2);
    /// let pool = ResourcePool::new(MockManager::new(), config).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("cache", Some(&tags));
    /// assert!(output.contains("resourcepool_resources_ready"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        let gauges: [(&str, &str, String); 6] = [
            ("resourcepool_capacity", "Resources owned by the pool", metrics.capacity.to_string()),
            ("resourcepool_resources_ready", "Verified resources waiting to be borrowed", metrics.ready.to_string()),
            ("resourcepool_resources_resting", "Resources waiting for a health check", metrics.resting.to_string()),
            ("resourcepool_resources_checked_out", "Resources held by borrowers", metrics.checked_out.to_string()),
            ("resourcepool_max_capacity", "Configured resource ceiling", metrics.max_capacity.to_string()),
            ("resourcepool_utilization", "Checked-out share of max capacity", format!("{:.2}", metrics.utilization)),
        ];
        for (name, help, value) in gauges {
            Self::push_metric(&mut output, name, help, "gauge", &labels, &value);
        }

        let counters: [(&str, &str, usize); 10] = [
            ("resourcepool_borrowed_total", "Total resources borrowed", metrics.total_borrowed),
            ("resourcepool_returned_total", "Total resources returned", metrics.total_returned),
            ("resourcepool_empty_waits_total", "Borrows that had to wait", metrics.empty_waits),
            ("resourcepool_health_check_failures_total", "Failed health checks", metrics.health_check_failures),
            ("resourcepool_repairs_total", "Resources reconnected after a failed health check", metrics.repairs),
            ("resourcepool_repair_failures_total", "Resources discarded after a failed reconnect", metrics.repair_failures),
            ("resourcepool_connect_failures_total", "Failed connects while growing", metrics.connect_failures),
            ("resourcepool_dropped_returns_total", "Returns discarded on a full resting queue", metrics.dropped_returns),
            ("resourcepool_detached_total", "Resources detached by borrowers", metrics.detached),
            ("resourcepool_maintenance_panics_total", "Maintenance ticks aborted by a panic", metrics.maintenance_panics),
        ];
        for (name, help, value) in counters {
            Self::push_metric(&mut output, name, help, "counter", &labels, &value.to_string());
        }

        output
    }

    fn push_metric(output: &mut String, name: &str, help: &str, kind: &str, labels: &str, value: &str) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_borrowed: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub empty_waits: AtomicUsize,
    pub health_check_failures: AtomicUsize,
    pub repairs: AtomicUsize,
    pub repair_failures: AtomicUsize,
    pub connect_failures: AtomicUsize,
    pub dropped_returns: AtomicUsize,
    pub detached: AtomicUsize,
    pub maintenance_panics: AtomicUsize,
}

/// Point-in-time sizes the tracker cannot see on its own
pub(crate) struct Occupancy {
    pub capacity: usize,
    pub max_capacity: usize,
    pub ready: usize,
    pub resting: usize,
    pub checked_out: usize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, occupancy: Occupancy) -> PoolMetrics {
        let utilization = if occupancy.max_capacity > 0 {
            occupancy.checked_out as f64 / occupancy.max_capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            empty_waits: self.empty_waits.load(Ordering::Relaxed),
            health_check_failures: self.health_check_failures.load(Ordering::Relaxed),
            repairs: self.repairs.load(Ordering::Relaxed),
            repair_failures: self.repair_failures.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            dropped_returns: self.dropped_returns.load(Ordering::Relaxed),
            detached: self.detached.load(Ordering::Relaxed),
            maintenance_panics: self.maintenance_panics.load(Ordering::Relaxed),
            capacity: occupancy.capacity,
            max_capacity: occupancy.max_capacity,
            ready: occupancy.ready,
            resting: occupancy.resting,
            checked_out: occupancy.checked_out,
            utilization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PoolMetrics {
        let tracker = MetricsTracker::new();
        MetricsTracker::incr(&tracker.total_borrowed);
        MetricsTracker::incr(&tracker.total_borrowed);
        MetricsTracker::incr(&tracker.repairs);
        tracker.get_metrics(Occupancy {
            capacity: 4,
            max_capacity: 8,
            ready: 1,
            resting: 1,
            checked_out: 2,
        })
    }

    #[test]
    fn test_snapshot_counts_and_utilization() {
        let metrics = sample();
        assert_eq!(metrics.total_borrowed, 2);
        assert_eq!(metrics.repairs, 1);
        assert_eq!(metrics.total_returned, 0);
        assert!((metrics.utilization - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_export_map() {
        let exported = sample().export();
        assert_eq!(exported["total_borrowed"], "2");
        assert_eq!(exported["utilization"], "0.25");
        assert_eq!(exported["checked_out"], "2");
    }

    #[test]
    fn test_prometheus_format() {
        let mut tags = HashMap::new();
        tags.insert("region".to_string(), "eu".to_string());
        let output = MetricsExporter::export_prometheus(&sample(), "cache", Some(&tags));

        assert!(output.contains("# TYPE resourcepool_borrowed_total counter"));
        assert!(output.contains("resourcepool_borrowed_total{pool=\"cache\",region=\"eu\"} 2"));
        assert!(output.contains("resourcepool_utilization{pool=\"cache\",region=\"eu\"} 0.25"));
    }
}
