//! Pool configuration options

use crate::errors::{PoolError, PoolResult};

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest accepted `max_capacity`
///
/// Both queues preallocate `max_capacity` rounded up to a power of two.
pub const MAX_CAPACITY_LIMIT: usize = 1 << 16;

/// Where and how pooled resources connect
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Endpoint {
    pub host: String,
    pub port: u16,

    /// Credential presented after connecting; empty means none
    #[cfg_attr(feature = "serde", serde(default))]
    pub credential: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            credential: String::new(),
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", 6379)
    }
}

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Endpoint, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_init_capacity(4)
///     .with_max_capacity(64)
///     .with_max_idle(16)
///     .with_max_idle_timeout(Duration::from_millis(50))
///     .with_endpoint(Endpoint::new("cache.local", 6379));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.queue_capacity(), 64);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Resources connected before the pool is handed to the caller
    pub init_capacity: usize,

    /// Hard ceiling on resources owned by the pool, including checked-out ones,
    /// at most [`MAX_CAPACITY_LIMIT`]
    pub max_capacity: usize,

    /// Growth step; accepted for compatibility, the pool grows one resource
    /// per maintenance tick
    pub capacity_increment: usize,

    /// Interval between maintenance ticks, must be non-zero
    pub max_idle_timeout: Duration,

    /// Maximum number of verified resources waiting to be borrowed
    pub max_idle: usize,

    /// Connection parameters handed to the resource manager
    pub endpoint: Endpoint,

    /// Timeout passed to every connect attempt
    pub connect_timeout: Duration,

    /// Deadline for async borrowing
    pub operation_timeout: Option<Duration>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            init_capacity: 8,
            max_capacity: 64,
            capacity_increment: 1,
            max_idle_timeout: Duration::from_millis(100),
            max_idle: 32,
            endpoint: Endpoint::default(),
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of resources connected at construction
    pub fn with_init_capacity(mut self, capacity: usize) -> Self {
        self.init_capacity = capacity;
        self
    }

    /// Set the maximum number of resources
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_max_capacity(100);
    ///
    /// assert_eq!(config.max_capacity, 100);
    /// assert_eq!(config.queue_capacity(), 128);
    /// ```
    pub fn with_max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_capacity_increment(mut self, increment: usize) -> Self {
        self.capacity_increment = increment;
        self
    }

    /// Set the maintenance interval
    pub fn with_max_idle_timeout(mut self, interval: Duration) -> Self {
        self.max_idle_timeout = interval;
        self
    }

    /// Set the ready-set cap
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the deadline used by async borrowing
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Check the configuration invariants
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_init_capacity(10)
    ///     .with_max_capacity(4);
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.init_capacity == 0 {
            return Err(PoolError::InvalidConfiguration(
                "init_capacity must be greater than zero".to_string(),
            ));
        }
        if self.init_capacity > self.max_capacity {
            return Err(PoolError::InvalidConfiguration(format!(
                "init_capacity ({}) exceeds max_capacity ({})",
                self.init_capacity, self.max_capacity
            )));
        }
        if self.max_idle == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_idle must be greater than zero".to_string(),
            ));
        }
        if self.max_capacity > MAX_CAPACITY_LIMIT {
            return Err(PoolError::InvalidConfiguration(format!(
                "max_capacity ({}) exceeds the limit of {}",
                self.max_capacity, MAX_CAPACITY_LIMIT
            )));
        }
        if self.max_idle_timeout.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "max_idle_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Slot count of the resting and ready queues
    ///
    /// `max_capacity` rounded up to a power of two, at least 2.
    pub fn queue_capacity(&self) -> usize {
        self.max_capacity.next_power_of_two().max(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PoolConfiguration::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_init_capacity() {
        let config = PoolConfiguration::new().with_init_capacity(0);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_zero_max_idle() {
        let config = PoolConfiguration::new().with_max_idle(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_max_capacity() {
        let config = PoolConfiguration::new().with_max_capacity(1 << 40);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));

        let config = PoolConfiguration::new().with_max_capacity(MAX_CAPACITY_LIMIT + 1);
        assert!(config.validate().is_err());

        let config = PoolConfiguration::new().with_max_capacity(MAX_CAPACITY_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_maintenance_interval() {
        let config = PoolConfiguration::new().with_max_idle_timeout(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_queue_capacity_rounds_up() {
        assert_eq!(PoolConfiguration::new().with_max_capacity(1).queue_capacity(), 2);
        assert_eq!(PoolConfiguration::new().with_max_capacity(5).queue_capacity(), 8);
        assert_eq!(PoolConfiguration::new().with_max_capacity(4096).queue_capacity(), 4096);
    }

    #[test]
    fn test_endpoint_builder() {
        let endpoint = Endpoint::new("db", 5432).with_credential("secret");
        assert_eq!(endpoint.host, "db");
        assert_eq!(endpoint.port, 5432);
        assert_eq!(endpoint.credential, "secret");
    }
}
