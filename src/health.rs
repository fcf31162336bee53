//! Health reporting for resource pools

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::HealthStatus;
///
/// let health = HealthStatus::new(3, 1, 0, 4, 8);
/// assert!(health.is_healthy());
/// assert_eq!(health.ready_resources, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Checked-out share of max capacity (0.0 to 1.0)
    pub utilization: f64,

    /// Verified resources waiting to be borrowed
    pub ready_resources: usize,

    /// Resources waiting for a health check
    pub resting_resources: usize,

    /// Resources held by borrowers
    pub checked_out_resources: usize,

    /// Resources owned by the pool
    pub capacity: usize,

    /// Configured ceiling on `capacity`
    pub max_capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(
        ready: usize,
        resting: usize,
        checked_out: usize,
        capacity: usize,
        max_capacity: usize,
    ) -> Self {
        let utilization = if max_capacity > 0 {
            checked_out as f64 / max_capacity as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        // Nothing left to hand out and no room to grow: borrowers will wait
        // until someone returns a resource.
        if ready == 0 && resting == 0 && capacity >= max_capacity {
            warnings.push("Pool is exhausted".to_string());
            is_healthy = false;
        } else if ready == 0 {
            warnings.push("No ready resources".to_string());
        }

        if capacity == 0 {
            warnings.push("Pool holds no resources".to_string());
            is_healthy = false;
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            ready_resources: ready,
            resting_resources: resting,
            checked_out_resources: checked_out,
            capacity,
            max_capacity,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_pool_is_unhealthy() {
        let health = HealthStatus::new(0, 0, 4, 4, 4);
        assert!(!health.is_healthy());
        assert!(health.warnings.iter().any(|w| w.contains("exhausted")));
        assert!(health.warnings.iter().any(|w| w.contains("utilization")));
    }

    #[test]
    fn test_empty_ready_set_only_warns() {
        let health = HealthStatus::new(0, 2, 1, 3, 16);
        assert!(health.is_healthy());
        assert_eq!(health.warning_count, 1);
    }
}
