//! Advanced usage examples

use esox_resourcepool::testing::MockManager;
use esox_resourcepool::{PoolConfiguration, PooledResource, ResourcePool};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Advanced Examples ===\n");

    // Example 1: Transparent repair of broken resources
    health_check_repair();

    // Example 2: Handles outliving their pool
    late_release();

    // Example 3: Many worker threads
    worker_threads();

    // Example 4: Prometheus export
    prometheus_export();
}

fn fast_config() -> PoolConfiguration {
    PoolConfiguration::new().with_max_idle_timeout(Duration::from_millis(5))
}

fn health_check_repair() {
    println!("1. Health-Check Repair:");

    let manager = MockManager::new();
    let stats = manager.stats();
    let pool = ResourcePool::new(manager, fast_config().with_init_capacity(2).with_max_capacity(2)).unwrap();

    // The next two health checks fail; maintenance reconnects quietly
    pool.manager().fail_health_checks(2);

    let mut conn = pool.borrow();
    println!("   Borrowed resource {}: {}", conn.id(), conn.execute("PING"));
    println!("   Repairs: {}, closes: {}", pool.metrics().repairs, stats.closes());
    println!();
}

fn late_release() {
    println!("2. Late Release:");

    let manager = MockManager::new();
    let stats = manager.stats();
    let pool = ResourcePool::new(manager, fast_config().with_init_capacity(1).with_max_capacity(1)).unwrap();

    let conn = pool.borrow();
    drop(pool);
    println!("   Pool alive after drop: {}", PooledResource::is_pool_alive(&conn));

    drop(conn);
    println!("   Resources destroyed: {}", stats.destroyed());
    println!();
}

fn worker_threads() {
    println!("3. Worker Threads:");

    let config = fast_config().with_init_capacity(2).with_max_capacity(8).with_max_idle(4);
    let pool = Arc::new(ResourcePool::new(MockManager::new(), config).unwrap());

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..5 {
                    let mut conn = pool.borrow();
                    conn.execute(&format!("SET worker:{} 1", i));
                    thread::sleep(Duration::from_millis(2));
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let metrics = pool.metrics();
    println!("   Borrowed: {}, capacity: {}", metrics.total_borrowed, metrics.capacity);
    println!();
}

fn prometheus_export() {
    println!("4. Prometheus Metrics Export:");

    let pool = ResourcePool::new(MockManager::new(), fast_config()).unwrap();

    {
        let _conn1 = pool.borrow();
        let _conn2 = pool.borrow();

        let mut tags = HashMap::new();
        tags.insert("service".to_string(), "example".to_string());
        tags.insert("env".to_string(), "dev".to_string());

        let prometheus_text = pool.export_metrics_prometheus("example_pool", Some(&tags));
        println!("{}", prometheus_text);
    }
}
