//! Async usage examples

use esox_resourcepool::testing::MockManager;
use esox_resourcepool::{PoolConfiguration, ResourcePool};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ResourcePool - Async Examples ===\n");

    // Example 1: Async borrow
    async_borrow().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

fn fast_config() -> PoolConfiguration {
    PoolConfiguration::new().with_max_idle_timeout(Duration::from_millis(5))
}

async fn async_borrow() {
    println!("1. Async Borrow:");
    let pool = ResourcePool::new(MockManager::new(), fast_config()).unwrap();

    {
        let mut conn = pool.borrow_async().await.unwrap();
        println!("   Borrowed asynchronously: {}", conn.execute("PING"));
    }

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");

    let config = fast_config()
        .with_init_capacity(1)
        .with_max_capacity(1)
        .with_timeout(Duration::from_millis(100));

    let pool = ResourcePool::new(MockManager::new(), config).unwrap();

    // Take the only resource
    let _conn = pool.borrow_async().await.unwrap();

    // Try to get another (should time out)
    match pool.borrow_async().await {
        Ok(_) => println!("   Got resource"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");

    let config = fast_config().with_init_capacity(2).with_max_capacity(4);
    let pool = Arc::new(ResourcePool::new(MockManager::new(), config).unwrap());

    let mut handles = vec![];

    for i in 0..10 {
        let pool = Arc::clone(&pool);
        let handle = tokio::spawn(async move {
            match pool.borrow_async().await {
                Ok(mut conn) => {
                    println!("   Task {} got resource {}: {}", i, conn.id(), conn.execute("PING"));
                    sleep(Duration::from_millis(20)).await;
                }
                Err(e) => println!("   Task {} couldn't get a resource: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final capacity: {}", pool.capacity());
}
