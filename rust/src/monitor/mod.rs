//! The Monitor: a blocking producer/consumer buffer that resizes itself.
//!
//! One `parking_lot::Mutex` guards the ring storage and the producers-done
//! flag. Producers park on `not_full`, consumers on `not_empty_or_done`; every
//! wait re-checks its predicate in a loop, so spurious wakeups are harmless.
//! After each enqueue or dequeue the configured [`ResizePolicy`] may
//! relinearize the storage into a new capacity, still under the lock.
//! Observers are notified only after the lock has been released.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::MonitorError;
use crate::observer::{MonitorEvent, NullObserver, Observer};
use crate::resize::{self, Mutation, ResizePolicy};
use crate::ringstore::RingStore;
use crate::{Item, NO_MORE_ITEMS};

struct State<T> {
    store: RingStore<T>,
    // false -> true exactly once
    producers_done: bool,
    resizes: u64,
}

/// Point-in-time view of a Monitor, taken under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub len: usize,
    pub capacity: usize,
    pub resizes: u64,
    pub producers_done: bool,
}

pub struct Monitor<T = Item> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty_or_done: Condvar,
    policy: ResizePolicy,
    observer: Arc<dyn Observer>,
}

impl<T> Monitor<T> {
    /// Creates a Monitor using [`resize::doubling_policy`].
    pub fn new(initial_capacity: usize) -> Result<Self, MonitorError> {
        Self::with_policy(initial_capacity, resize::doubling_policy)
    }

    pub fn with_policy(initial_capacity: usize, policy: ResizePolicy) -> Result<Self, MonitorError> {
        if initial_capacity == 0 {
            return Err(MonitorError::ZeroCapacity);
        }
        Ok(Monitor {
            state: Mutex::new(State {
                store: RingStore::new(initial_capacity),
                producers_done: false,
                resizes: 0,
            }),
            not_full: Condvar::new(),
            not_empty_or_done: Condvar::new(),
            policy,
            observer: Arc::new(NullObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Inserts `item` at the back, blocking while the buffer is full.
    ///
    /// With the growth policies in this crate the buffer doubles as soon as
    /// an insert fills it, so in practice this only waits for the lock.
    /// Wakes one waiting consumer.
    pub fn produce(&self, item: T) {
        let mut state = self.state.lock();
        while state.store.is_full() {
            self.not_full.wait(&mut state);
        }

        state.store.push_back(item);
        let resized = self.apply_policy(&mut state, Mutation::Enqueued);
        drop(state);

        self.not_empty_or_done.notify_one();
        self.report(resized);
    }

    /// Removes the item at the front, blocking while the buffer is empty and
    /// producers are still running. Returns `None` once producers are done
    /// and nothing is left. Wakes one waiting producer.
    pub fn consume_next(&self) -> Option<T> {
        let mut state = self.state.lock();
        while state.store.is_empty() && !state.producers_done {
            self.not_empty_or_done.wait(&mut state);
        }

        // empty here means producers are done
        let item = state.store.pop_front()?;
        let resized = self.apply_policy(&mut state, Mutation::Dequeued);
        drop(state);

        self.not_full.notify_one();
        self.report(resized);
        Some(item)
    }

    /// Marks producers as finished and wakes every parked consumer.
    ///
    /// Call only after all producer threads have been joined. Calling it
    /// again has no further effect.
    pub fn set_producers_done(&self) {
        let first = {
            let mut state = self.state.lock();
            let first = !state.producers_done;
            state.producers_done = true;
            first
        };

        self.not_empty_or_done.notify_all();
        if first {
            self.observer.on_event(&MonitorEvent::ProducersDone);
        }
    }

    // Snapshot only; may be stale by the time the caller acts on it.
    pub fn is_empty(&self) -> bool {
        self.state.lock().store.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().store.capacity()
    }

    pub fn producers_done(&self) -> bool {
        self.state.lock().producers_done
    }

    pub fn stats(&self) -> MonitorStats {
        let state = self.state.lock();
        MonitorStats {
            len: state.store.len(),
            capacity: state.store.capacity(),
            resizes: state.resizes,
            producers_done: state.producers_done,
        }
    }

    // Runs with the lock held. A capacity that could not hold the current
    // items, or that equals the current one, is ignored.
    fn apply_policy(&self, state: &mut State<T>, mutation: Mutation) -> Option<MonitorEvent> {
        let from = state.store.capacity();
        let len = state.store.len();
        let to = (self.policy)(mutation, len, from)?;
        if to == from || to == 0 || to < len {
            return None;
        }

        state.store.relinearize(to);
        state.resizes += 1;
        Some(MonitorEvent::Resized { from, to, len })
    }

    fn report(&self, event: Option<MonitorEvent>) {
        if let Some(event) = event {
            self.observer.on_event(&event);
        }
    }
}

impl Monitor<Item> {
    /// Like [`Monitor::consume_next`], but returns [`NO_MORE_ITEMS`] (`-1`)
    /// instead of `None`. Callers that produce `-1` as a real item should use
    /// `consume_next` instead.
    pub fn consume(&self) -> Item {
        self.consume_next().unwrap_or(NO_MORE_ITEMS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_zero_capacity_rejected() {
        let result = Monitor::<Item>::new(0);
        assert_eq!(result.err(), Some(MonitorError::ZeroCapacity));
    }

    #[test]
    fn test_grow_then_drain_scenario() {
        let monitor: Monitor = Monitor::new(4).unwrap();

        for item in 0..4 {
            monitor.produce(item);
        }
        assert_eq!(monitor.capacity(), 8);
        assert_eq!(monitor.len(), 4);

        monitor.produce(4);
        assert_eq!(monitor.len(), 5);
        assert_eq!(monitor.capacity(), 8);
        assert_eq!(monitor.stats().resizes, 1);

        let drained: Vec<Item> = (0..5).map(|_| monitor.consume()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        // 8 -> 4 at len 2, 4 -> 2 at len 1, no shrink at len 0
        assert_eq!(monitor.capacity(), 2);
        assert!(monitor.is_empty());

        monitor.set_producers_done();
        assert_eq!(monitor.consume(), NO_MORE_ITEMS);
        assert_eq!(monitor.consume(), NO_MORE_ITEMS);
    }

    #[test]
    fn test_grow_accepts_next_item_without_blocking() {
        let monitor: Monitor = Monitor::new(1).unwrap();
        monitor.produce(10);
        assert_eq!(monitor.capacity(), 2);
        monitor.produce(11);
        assert_eq!(monitor.capacity(), 4);
        monitor.produce(12);
        assert_eq!(monitor.stats().len, 3);
    }

    fn fixed_capacity(_: Mutation, _: usize, _: usize) -> Option<usize> {
        None
    }

    #[test]
    fn test_full_buffer_blocks_producer_until_consume() {
        let monitor: Arc<Monitor> = Arc::new(Monitor::with_policy(2, fixed_capacity).unwrap());
        monitor.produce(1);
        monitor.produce(2);
        assert_eq!(monitor.len(), monitor.capacity());

        let stored = Arc::new(AtomicBool::new(false));
        let producer = {
            let monitor = Arc::clone(&monitor);
            let stored = Arc::clone(&stored);
            thread::spawn(move || {
                monitor.produce(3);
                stored.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!stored.load(Ordering::SeqCst), "produce returned while full");
        assert_eq!(monitor.len(), 2);

        assert_eq!(monitor.consume(), 1);
        producer.join().unwrap();
        assert!(stored.load(Ordering::SeqCst));
        assert_eq!(monitor.len(), 2);
        assert_eq!(monitor.capacity(), 2);
        assert_eq!(monitor.stats().resizes, 0);

        assert_eq!(monitor.consume(), 2);
        assert_eq!(monitor.consume(), 3);
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_shrink_trigger_and_floor() {
        let monitor: Monitor = Monitor::new(16).unwrap();
        for item in 0..5 {
            monitor.produce(item);
        }
        assert_eq!(monitor.capacity(), 16);

        assert_eq!(monitor.consume(), 0);
        assert_eq!(monitor.len(), 4);
        assert_eq!(monitor.capacity(), 8);

        assert_eq!(monitor.consume(), 1);
        assert_eq!(monitor.capacity(), 8);
        assert_eq!(monitor.consume(), 2);
        assert_eq!(monitor.capacity(), 4);
        assert_eq!(monitor.consume(), 3);
        assert_eq!(monitor.capacity(), 2);
        assert_eq!(monitor.consume(), 4);
        assert_eq!(monitor.capacity(), 2);
    }

    #[test]
    fn test_damped_policy_holds_capacity() {
        let monitor: Monitor = Monitor::with_policy(16, resize::damped_policy).unwrap();
        for item in 0..5 {
            monitor.produce(item);
        }
        // doubling_policy would halve here, at len 4
        monitor.consume();
        assert_eq!(monitor.capacity(), 16);
        monitor.consume();
        assert_eq!(monitor.capacity(), 16);
        monitor.consume();
        assert_eq!(monitor.len(), 2);
        assert_eq!(monitor.capacity(), 8);
    }

    #[test]
    fn test_observer_sees_resizes_and_done_once() {
        let recorder = Arc::new(RecordingObserver::new());
        let monitor: Monitor = Monitor::new(2).unwrap().with_observer(recorder.clone());

        monitor.produce(1);
        monitor.produce(2);
        monitor.set_producers_done();
        monitor.set_producers_done();

        assert_eq!(
            recorder.events(),
            vec![
                MonitorEvent::Resized {
                    from: 2,
                    to: 4,
                    len: 2
                },
                MonitorEvent::ProducersDone,
            ]
        );
        assert!(monitor.producers_done());
    }

    #[test]
    fn test_done_with_items_left_still_drains() {
        let monitor: Monitor = Monitor::new(4).unwrap();
        monitor.produce(7);
        monitor.produce(8);
        monitor.set_producers_done();

        assert_eq!(monitor.consume(), 7);
        assert_eq!(monitor.consume(), 8);
        assert_eq!(monitor.consume(), NO_MORE_ITEMS);
    }

    #[test]
    fn test_consume_next_generic_items() {
        let monitor: Monitor<String> = Monitor::new(2).unwrap();
        monitor.produce("a".to_string());
        monitor.produce("b".to_string());
        monitor.set_producers_done();

        assert_eq!(monitor.consume_next().as_deref(), Some("a"));
        assert_eq!(monitor.consume_next().as_deref(), Some("b"));
        assert_eq!(monitor.consume_next(), None);
    }

    #[test]
    fn test_shutdown_wakes_all_blocked_consumers() {
        let monitor: Arc<Monitor> = Arc::new(Monitor::new(4).unwrap());

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || monitor.consume())
            })
            .collect();

        // give the consumers time to park
        thread::sleep(Duration::from_millis(50));
        monitor.set_producers_done();

        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), NO_MORE_ITEMS);
        }
    }

    #[test]
    fn test_blocked_consumer_woken_by_produce() {
        let monitor: Arc<Monitor> = Arc::new(Monitor::new(4).unwrap());
        let consumer = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.consume())
        };

        thread::sleep(Duration::from_millis(20));
        monitor.produce(42);
        assert_eq!(consumer.join().unwrap(), 42);
    }

    #[test]
    fn test_single_producer_order() {
        let monitor: Arc<Monitor> = Arc::new(Monitor::new(2).unwrap());
        let producer = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                for item in 0..200 {
                    monitor.produce(item);
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 200 {
            seen.push(monitor.consume());
        }
        producer.join().unwrap();

        assert_eq!(seen, (0..200).collect::<Vec<Item>>());
    }
}
