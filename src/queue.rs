//! Bounded lock-free multi-producer/multi-consumer queue
//!
//! A ring buffer of slots where every slot carries its own sequence number.
//! The sequence tells a producer whether the slot is free for the lap it is
//! on and tells a consumer whether the slot holds a value for its lap, so
//! neither side needs a lock or a double-width compare-and-swap.

use crate::errors::{PoolError, PoolResult};

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity MPMC queue with non-blocking operations
///
/// # Examples
///
/// ```
/// use esox_resourcepool::BoundedQueue;
///
/// let queue = BoundedQueue::new(4).unwrap();
/// assert!(queue.try_enqueue(1).is_ok());
/// assert!(queue.try_enqueue(2).is_ok());
///
/// assert_eq!(queue.try_dequeue(), Some(1));
/// assert_eq!(queue.try_dequeue(), Some(2));
/// assert_eq!(queue.try_dequeue(), None);
/// ```
pub struct BoundedQueue<T> {
    buffer: Box<[Slot<T>]>,
    mask: usize,
    enqueue_pos: CachePadded<AtomicUsize>,
    dequeue_pos: CachePadded<AtomicUsize>,
}

// Values move between threads through the slots; a slot's value is only
// touched by the thread that won the cursor CAS for it.
unsafe impl<T: Send> Send for BoundedQueue<T> {}
unsafe impl<T: Send> Sync for BoundedQueue<T> {}

impl<T> BoundedQueue<T> {
    /// Create a queue with `capacity` slots
    ///
    /// Fails with [`PoolError::InvalidCapacity`] unless `capacity` is a power
    /// of two and at least 2.
    ///
    /// ```
    /// use esox_resourcepool::{BoundedQueue, PoolError};
    ///
    /// assert!(BoundedQueue::<u8>::new(1024).is_ok());
    /// assert!(matches!(BoundedQueue::<u8>::new(100), Err(PoolError::InvalidCapacity(100))));
    /// ```
    pub fn new(capacity: usize) -> PoolResult<Self> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(PoolError::InvalidCapacity(capacity));
        }

        let buffer = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            buffer,
            mask: capacity - 1,
            enqueue_pos: CachePadded::new(AtomicUsize::new(0)),
            dequeue_pos: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Try to push a value, handing it back if the queue is full
    pub fn try_enqueue(&self, value: T) -> Result<(), T> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        let slot = loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos) as isize;

            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break slot,
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // The slot still holds the value from the previous lap.
                return Err(value);
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        };

        // SAFETY: winning the CAS on `enqueue_pos` gives this thread exclusive
        // write access to the slot until the sequence is published below.
        unsafe { (*slot.value.get()).write(value) };
        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Try to pop the oldest value, returning `None` if the queue is empty
    pub fn try_dequeue(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);
        let slot = loop {
            let slot = &self.buffer[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos.wrapping_add(1)) as isize;

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break slot,
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        };

        // SAFETY: the Acquire load above observed the producer's Release store,
        // so the value is initialized, and winning the CAS makes this thread
        // its only reader.
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.sequence
            .store(pos.wrapping_add(self.mask + 1), Ordering::Release);
        Some(value)
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Approximate number of queued values
    ///
    /// Exact when no other thread is operating on the queue.
    pub fn len(&self) -> usize {
        loop {
            let tail = self.enqueue_pos.load(Ordering::SeqCst);
            let head = self.dequeue_pos.load(Ordering::SeqCst);
            // Re-read the tail so both cursors come from the same moment.
            if self.enqueue_pos.load(Ordering::SeqCst) == tail {
                return tail.wrapping_sub(head).min(self.capacity());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        while self.try_dequeue().is_some() {}
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_rejects_invalid_capacity() {
        for capacity in [0, 1, 3, 100] {
            assert!(matches!(
                BoundedQueue::<u32>::new(capacity),
                Err(PoolError::InvalidCapacity(c)) if c == capacity
            ));
        }
    }

    #[test]
    fn test_accepts_power_of_two_capacity() {
        for capacity in [2, 4, 1024] {
            let queue = BoundedQueue::<u32>::new(capacity).unwrap();
            assert_eq!(queue.capacity(), capacity);
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_full_queue_hands_value_back() {
        let queue = BoundedQueue::new(2).unwrap();
        assert!(queue.try_enqueue("a").is_ok());
        assert!(queue.try_enqueue("b").is_ok());
        assert!(queue.is_full());
        assert_eq!(queue.try_enqueue("c"), Err("c"));

        // The rejected push must not have overwritten the oldest value.
        assert_eq!(queue.try_dequeue(), Some("a"));
        assert!(queue.try_enqueue("c").is_ok());
        assert_eq!(queue.try_dequeue(), Some("b"));
        assert_eq!(queue.try_dequeue(), Some("c"));
        assert_eq!(queue.try_dequeue(), None);
    }

    #[test]
    fn test_wraps_around_many_laps() {
        let queue = BoundedQueue::new(4).unwrap();
        for i in 0..1000 {
            queue.try_enqueue(i).unwrap();
            assert_eq!(queue.try_dequeue(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_releases_queued_values() {
        let marker = Arc::new(());
        {
            let queue = BoundedQueue::new(8).unwrap();
            for _ in 0..5 {
                queue.try_enqueue(Arc::clone(&marker)).unwrap();
            }
            assert_eq!(Arc::strong_count(&marker), 6);
        }
        assert_eq!(Arc::strong_count(&marker), 1);
    }

    #[test]
    fn test_concurrent_no_double_delivery() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 10_000;

        let queue = Arc::new(BoundedQueue::new(64).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let mut value = p * PER_PRODUCER + i;
                        while let Err(v) = queue.try_enqueue(value) {
                            value = v;
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    loop {
                        match queue.try_dequeue() {
                            Some(v) => seen.push(v),
                            None if done.load(Ordering::Acquire) => {
                                // Drain whatever landed after the last check.
                                while let Some(v) = queue.try_dequeue() {
                                    seen.push(v);
                                }
                                break;
                            }
                            None => thread::yield_now(),
                        }
                    }
                    seen
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        done.store(true, Ordering::Release);

        let mut all = HashSet::new();
        let mut total = 0;
        for consumer in consumers {
            for value in consumer.join().unwrap() {
                total += 1;
                assert!(all.insert(value), "value {} delivered twice", value);
            }
        }
        assert_eq!(total, PRODUCERS * PER_PRODUCER);
        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(
            shift in 1u32..6,
            ops in proptest::collection::vec(any::<bool>(), 0..512),
        ) {
            let capacity = 1usize << shift;
            let queue = BoundedQueue::new(capacity).unwrap();
            let mut model = std::collections::VecDeque::new();
            let mut next = 0u32;

            for enqueue in ops {
                if enqueue {
                    let accepted = queue.try_enqueue(next).is_ok();
                    prop_assert_eq!(accepted, model.len() < capacity);
                    if accepted {
                        model.push_back(next);
                    }
                    next += 1;
                } else {
                    prop_assert_eq!(queue.try_dequeue(), model.pop_front());
                }
                prop_assert!(queue.len() <= capacity);
                prop_assert_eq!(queue.len(), model.len());
            }
        }
    }
}
