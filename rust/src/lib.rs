//! # elasticbuf - A Self-Resizing Producer/Consumer Monitor
//!
//! A thread-safe buffer that coordinates any number of producer and consumer
//! threads. Producers block when the buffer is full, consumers block when it is
//! empty, and the buffer grows when an insert fills it and shrinks when it is
//! mostly unused.
//!
//! ## Features
//!
//! - **Monitor semantics**: one lock, two condition variables (`not_full` and
//!   `not_empty_or_done`), predicate-guarded waits
//! - **Automatic resizing**: capacity doubles when an enqueue fills the buffer and
//!   halves after a dequeue leaves it at most a quarter full
//! - **Pluggable resize policies**: `doubling_policy` (default) and `damped_policy`
//!   (shrinks later, so alternating load does not resize on every call)
//! - **Termination protocol**: after `set_producers_done`, every blocked or future
//!   `consume` on an empty buffer returns the `-1` sentinel
//! - **Observers**: structured events delivered outside the lock, to `tracing`,
//!   to memory, or to a JSON-lines file written by a background thread
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use elasticbuf::monitor::Monitor;
//! use elasticbuf::NO_MORE_ITEMS;
//!
//! let monitor: Arc<Monitor> = Arc::new(Monitor::new(4).unwrap());
//!
//! let producer = {
//!     let monitor = Arc::clone(&monitor);
//!     thread::spawn(move || {
//!         for i in 0..10 {
//!             monitor.produce(i);
//!         }
//!     })
//! };
//!
//! let consumer = {
//!     let monitor = Arc::clone(&monitor);
//!     thread::spawn(move || {
//!         let mut seen = Vec::new();
//!         loop {
//!             let item = monitor.consume();
//!             if item == NO_MORE_ITEMS {
//!                 break;
//!             }
//!             seen.push(item);
//!         }
//!         seen
//!     })
//! };
//!
//! producer.join().unwrap();
//! monitor.set_producers_done();
//! assert_eq!(consumer.join().unwrap(), (0..10).collect::<Vec<_>>());
//! ```
//!
//! ## Running a Simulation
//!
//! The `driver` module spawns producers and consumers the way the
//! `monitor_sim` binary does:
//!
//! ```rust
//! use std::sync::Arc;
//! use elasticbuf::driver::{self, DriverConfig};
//! use elasticbuf::observer::NullObserver;
//!
//! let config = DriverConfig {
//!     producers: 2,
//!     consumers: 2,
//!     produce_delay_ms: 0,
//!     ..DriverConfig::default()
//! };
//! let report = driver::run(&config, Arc::new(NullObserver)).unwrap();
//! assert_eq!(report.total_consumed, 40);
//! ```
//!
//! ```bash
//! cargo run --bin monitor_sim -- -p 3 -c 2 -s 4 -t 5 --log-file run.log
//! cargo bench
//! ```

pub mod driver;
pub mod error;
pub mod monitor;
pub mod observer;
pub mod resize;
pub mod ringstore;

/// Item type carried by the Monitor's integer API.
pub type Item = i64;

/// Returned by `Monitor::consume` once producers are done and the buffer is empty.
pub const NO_MORE_ITEMS: Item = -1;
