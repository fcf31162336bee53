//! Basic usage examples for ResourcePool

use esox_resourcepool::testing::MockManager;
use esox_resourcepool::{Endpoint, PoolConfiguration, ResourcePool};
use std::time::Duration;

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Borrow and automatic return
    simple_pool();

    // Example 2: Pool with configuration
    configured_pool();

    // Example 3: Try methods
    try_methods();

    // Example 4: Metrics and health
    metrics_and_health();
}

fn fast_config() -> PoolConfiguration {
    PoolConfiguration::new().with_max_idle_timeout(Duration::from_millis(5))
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = ResourcePool::new(MockManager::new(), fast_config()).unwrap();

    {
        let mut conn = pool.borrow();
        println!("   Resource {} answered: {}", conn.id(), conn.execute("PING"));
        // Returned to the pool when dropped
    }

    println!("   Checked out after return: {}\n", pool.checked_out_count());
}

fn configured_pool() {
    println!("2. Configured Pool:");

    let config = fast_config()
        .with_init_capacity(2)
        .with_max_capacity(8)
        .with_max_idle(4)
        .with_endpoint(Endpoint::new("cache.local", 6379).with_credential("secret"));

    let pool = ResourcePool::new(MockManager::new(), config).unwrap();

    {
        let _conn1 = pool.borrow();
        let _conn2 = pool.borrow();
        let _conn3 = pool.borrow();
        println!("   Checked out: {}", pool.checked_out_count());
        println!("   Capacity grew to: {}", pool.capacity());
    }

    println!("   After return - Resting: {}\n", pool.resting_count());
}

fn try_methods() {
    println!("3. Try Methods:");
    let config = fast_config().with_init_capacity(1).with_max_capacity(1);
    let pool = ResourcePool::new(MockManager::new(), config).unwrap();

    // Wait for the only resource to be verified
    let conn1 = pool.borrow();
    println!("   First borrow: Success");

    // Try again while it is checked out
    let conn2 = pool.try_borrow();
    assert!(conn2.is_none());
    println!("   Second try: None (nothing ready)");

    match pool.borrow_timeout(Duration::from_millis(20)) {
        Ok(_) => println!("   Timed borrow: Success"),
        Err(e) => println!("   Timed borrow: {}", e),
    }

    drop(conn1);

    // It comes back after the next health check
    let conn3 = pool.borrow_timeout(Duration::from_secs(1));
    println!("   After return: {}\n", if conn3.is_ok() { "Success" } else { "Timed out" });
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let config = fast_config().with_init_capacity(3).with_max_capacity(4);
    let pool = ResourcePool::new(MockManager::new(), config).unwrap();

    {
        let _conn1 = pool.borrow();
        let _conn2 = pool.borrow();

        let health = pool.health_status();
        println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
        println!("   Utilization: {:.1}%", health.utilization * 100.0);
        println!(
            "   Checked out: {}, Ready: {}, Resting: {}",
            health.checked_out_resources, health.ready_resources, health.resting_resources
        );
    }

    let mut metrics: Vec<_> = pool.export_metrics().into_iter().collect();
    metrics.sort();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
