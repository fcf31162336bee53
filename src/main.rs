// EsoxSolutions.ResourcePool
// Bounded, self-healing resource pool with background maintenance

// This is just a binary wrapper - the actual library is in lib.rs
// Run demos with: cargo run --example basic

use esox_resourcepool::testing::MockManager;
use esox_resourcepool::{PoolConfiguration, ResourcePool};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== EsoxSolutions.ResourcePool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let config = PoolConfiguration::new()
        .with_init_capacity(2)
        .with_max_capacity(4)
        .with_max_idle_timeout(Duration::from_millis(10));

    let pool = match ResourcePool::new(MockManager::new(), config) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("  Failed to start pool: {}", e);
            return;
        }
    };

    {
        let mut conn = pool.borrow();
        println!("  Resource {} says: {}", conn.id(), conn.execute("PING"));
    }

    println!("  Checked out after return: {}", pool.checked_out_count());
}
