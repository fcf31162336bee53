use esox_resourcepool::testing::MockManager;
use esox_resourcepool::{PoolConfiguration, PooledResource, ResourcePool};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn config(init: usize, max: usize) -> PoolConfiguration {
    PoolConfiguration::new()
        .with_init_capacity(init)
        .with_max_capacity(max)
        .with_max_idle(max)
        .with_max_idle_timeout(Duration::from_millis(1))
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_warmup_connects_before_returning() {
    let manager = MockManager::new();
    let stats = manager.stats();

    // A long interval keeps maintenance from growing the pool meanwhile.
    let config = config(5, 16).with_max_idle_timeout(Duration::from_secs(1));
    let pool = ResourcePool::new(manager, config).unwrap();

    assert_eq!(stats.connects(), 5);
    assert_eq!(pool.capacity(), 5);
}

#[test]
fn test_idle_cap_respected() {
    let pool = ResourcePool::new(MockManager::new(), config(10, 16).with_max_idle(3)).unwrap();

    wait_until(|| pool.ready_count() == 3);
    let until = Instant::now() + Duration::from_millis(50);
    while Instant::now() < until {
        assert!(pool.ready_count() <= 3);
        assert!(pool.idle_count() <= 3);
        thread::sleep(Duration::from_millis(1));
    }

    // The rest keep cycling through resting instead of being dropped.
    assert_eq!(pool.capacity(), 10);
    wait_until(|| pool.ready_count() + pool.resting_count() == 10);
}

#[test]
fn test_recycling_round_trip() {
    let pool = ResourcePool::new(MockManager::new(), config(1, 1)).unwrap();

    let first_id = {
        let mut res = pool.borrow();
        assert_eq!(res.execute("PING"), "PONG");
        res.id()
    };

    let mut res = pool.borrow_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(res.id(), first_id);
    assert_eq!(res.execute("PING"), "PONG");
    assert_eq!(pool.metrics().total_returned, 1);
}

#[test]
fn test_late_release_after_teardown() {
    let manager = MockManager::new();
    let stats = manager.stats();
    let pool = ResourcePool::new(manager, config(1, 1)).unwrap();

    let res = pool.borrow();
    drop(pool);

    assert!(!PooledResource::is_pool_alive(&res));
    assert_eq!(stats.destroyed(), 0);

    drop(res);
    assert_eq!(stats.destroyed(), 1);
    // Destroyed directly, without the pool's close path.
    assert_eq!(stats.closes(), 0);
}

#[test]
fn test_concurrent_release_during_teardown() {
    let manager = MockManager::new();
    let stats = manager.stats();
    let pool = ResourcePool::new(manager, config(4, 4)).unwrap();

    let handles: Vec<_> = (0..4).map(|_| pool.borrow()).collect();
    let barrier = Arc::new(Barrier::new(5));

    let releasers: Vec<_> = handles
        .into_iter()
        .map(|res| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                drop(res);
            })
        })
        .collect();

    barrier.wait();
    drop(pool);

    for releaser in releasers {
        releaser.join().unwrap();
    }
    assert_eq!(stats.destroyed(), 4);
}

#[test]
fn test_health_check_repair_is_invisible() {
    let manager = MockManager::new();
    let stats = manager.stats();
    manager.fail_health_checks(1);

    let pool = ResourcePool::new(manager, config(1, 1)).unwrap();
    let mut res = pool.borrow();

    assert!(res.is_connected());
    assert_eq!(res.execute("PING"), "PONG");

    let metrics = pool.metrics();
    assert_eq!(metrics.health_check_failures, 1);
    assert_eq!(metrics.repairs, 1);
    assert_eq!(stats.closes(), 1);
    assert_eq!(stats.connects(), 2);
}

#[test]
fn test_failed_repair_is_replaced() {
    let manager = MockManager::new();
    manager.fail_health_checks(1);
    manager.fail_connects_after(1);

    let pool = ResourcePool::new(manager, config(1, 1)).unwrap();
    wait_until(|| pool.metrics().repair_failures == 1);
    assert_eq!(pool.capacity(), 0);

    pool.manager().allow_connects();
    let res = pool.borrow_timeout(Duration::from_secs(5)).unwrap();
    assert!(res.is_connected());
    assert_eq!(pool.capacity(), 1);
}

#[test]
fn test_panicking_manager_does_not_stall_pool() {
    let manager = MockManager::new();
    let stats = manager.stats();
    manager.panic_health_checks(1);

    let pool = ResourcePool::new(manager, config(2, 2)).unwrap();
    let res = pool.borrow_timeout(Duration::from_secs(5)).unwrap();
    assert!(res.is_connected());

    assert_eq!(pool.metrics().maintenance_panics, 1);
    assert_eq!(stats.destroyed(), 1);
    wait_until(|| pool.capacity() == 2);
    assert_eq!(stats.connects(), 3);
}

#[test]
fn test_many_workers_share_pool() {
    const WORKERS: usize = 8;
    const ROUNDS: usize = 50;

    let pool = Arc::new(ResourcePool::new(MockManager::new(), config(2, 4)).unwrap());

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let mut res = pool.borrow();
                    assert_eq!(res.execute("PING"), "PONG");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.total_borrowed, WORKERS * ROUNDS);
    assert_eq!(metrics.total_returned, WORKERS * ROUNDS);
    assert_eq!(metrics.checked_out, 0);
    assert!(metrics.capacity <= 4);
}
