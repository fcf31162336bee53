//! # EsoxSolutions.ResourcePool
//!
//! Bounded, thread-safe pool of long-lived resources (connections and the
//! like) that keeps itself healthy in the background.
//!
//! ## Features
//!
//! - Lock-free bounded MPMC queue for the resting and ready sets
//! - Automatic return of resources via RAII (Drop trait)
//! - Weak back-references: handles may safely outlive their pool
//! - Background maintenance: health checks, lazy growth, transparent repair
//! - Blocking, non-blocking, deadline-bounded and async borrowing
//! - Health status and metrics, with Prometheus export
//! - Pool warm-up at construction
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::testing::MockManager;
//! use esox_resourcepool::{PoolConfiguration, ResourcePool};
//!
//! let pool = ResourcePool::new(MockManager::new(), PoolConfiguration::default()).unwrap();
//! {
//!     let mut conn = pool.borrow();
//!     println!("Got: {}", conn.execute("PING"));
//!     // Resource automatically returned when `conn` goes out of scope
//! }
//! ```

mod config;
mod errors;
mod handle;
mod health;
mod maintenance;
mod manager;
mod metrics;
mod pool;
mod queue;
pub mod testing;

pub use config::{Endpoint, PoolConfiguration, MAX_CAPACITY_LIMIT};
pub use errors::{PoolError, PoolResult};
pub use handle::PooledResource;
pub use health::HealthStatus;
pub use manager::ResourceManager;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::ResourcePool;
pub use queue::BoundedQueue;
