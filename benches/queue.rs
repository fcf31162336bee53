use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossbeam::queue::ArrayQueue;
use esox_resourcepool::BoundedQueue;
use std::sync::Arc;
use std::thread;

const CAPACITY: usize = 1024;
const ITEMS: usize = 10_000;

fn single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_dequeue");

    group.bench_function("bounded_queue", |b| {
        let queue = BoundedQueue::new(CAPACITY).unwrap();
        b.iter(|| {
            queue.try_enqueue(black_box(1u64)).unwrap();
            black_box(queue.try_dequeue());
        })
    });

    group.bench_function("array_queue", |b| {
        let queue = ArrayQueue::new(CAPACITY);
        b.iter(|| {
            queue.push(black_box(1u64)).unwrap();
            black_box(queue.pop());
        })
    });

    group.finish();
}

fn contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("four_threads");
    group.sample_size(20);

    group.bench_function("bounded_queue", |b| {
        b.iter(|| {
            let queue = Arc::new(BoundedQueue::new(CAPACITY).unwrap());
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        for i in 0..ITEMS {
                            let mut value = i;
                            while let Err(v) = queue.try_enqueue(value) {
                                value = v;
                            }
                            while queue.try_dequeue().is_none() {}
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
        })
    });

    group.bench_function("array_queue", |b| {
        b.iter(|| {
            let queue = Arc::new(ArrayQueue::new(CAPACITY));
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        for i in 0..ITEMS {
                            let mut value = i;
                            while let Err(v) = queue.push(value) {
                                value = v;
                            }
                            while queue.pop().is_none() {}
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(benches, single_thread, contended);
criterion_main!(benches);
