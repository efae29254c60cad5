//! Runs N producer threads and M consumer threads against one Monitor.
//!
//! Producers each emit `items_per_producer` items valued
//! `index + producer_id * 1000`, pausing between items. Once every producer
//! has been joined the driver calls [`Monitor::set_producers_done`], then waits
//! for the consumers. A consumer stops when it receives the no-more-items
//! sentinel, when it sees producers done and an empty buffer before calling
//! `consume`, or when its own time budget has run out (checked between calls).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::DriverError;
use crate::monitor::{Monitor, MonitorStats};
use crate::observer::{ExitReason, MonitorEvent, Observer};
use crate::resize::{self, ResizePolicy};
use crate::{Item, NO_MORE_ITEMS};

// Spacing between producer id ranges in item values.
pub const PRODUCER_ITEM_STRIDE: Item = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub producers: usize,
    pub consumers: usize,
    pub initial_capacity: usize,
    // how long each consumer keeps calling consume(), in seconds. Compared
    // against the exact elapsed time after each item, so a budget of 0 stops
    // a consumer right after its first item.
    pub consumer_budget_secs: u64,
    pub items_per_producer: usize,
    pub produce_delay_ms: u64,
    // extra random pause of 0..=jitter ms after each item
    pub produce_jitter_ms: u64,
    pub damped_resize: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            producers: 2,
            consumers: 2,
            initial_capacity: 4,
            consumer_budget_secs: 10,
            items_per_producer: 20,
            produce_delay_ms: 100,
            produce_jitter_ms: 0,
            damped_resize: false,
        }
    }
}

impl DriverConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let text = fs::read_to_string(path)?;
        let config: DriverConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if self.producers == 0 {
            return Err(DriverError::InvalidConfig(
                "at least one producer is required".to_string(),
            ));
        }
        if self.consumers == 0 {
            return Err(DriverError::InvalidConfig(
                "at least one consumer is required".to_string(),
            ));
        }
        if self.initial_capacity == 0 {
            return Err(DriverError::InvalidConfig(
                "initial capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resize_policy(&self) -> ResizePolicy {
        if self.damped_resize {
            resize::damped_policy
        } else {
            resize::doubling_policy
        }
    }

    fn consumer_budget(&self) -> Duration {
        Duration::from_secs(self.consumer_budget_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerReport {
    pub producer: usize,
    pub produced: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerReport {
    pub consumer: usize,
    pub consumed: usize,
    pub reason: ExitReason,
    // in consumption order
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub config: DriverConfig,
    pub producers: Vec<ProducerReport>,
    pub consumers: Vec<ConsumerReport>,
    pub total_produced: usize,
    pub total_consumed: usize,
    pub final_stats: MonitorStats,
    pub elapsed_ms: u128,
}

pub fn item_for(producer: usize, index: usize) -> Item {
    index as Item + producer as Item * PRODUCER_ITEM_STRIDE
}

pub fn run(config: &DriverConfig, observer: Arc<dyn Observer>) -> Result<RunReport, DriverError> {
    config.validate()?;

    let monitor: Arc<Monitor> = Arc::new(
        Monitor::with_policy(config.initial_capacity, config.resize_policy())?
            .with_observer(Arc::clone(&observer)),
    );

    info!(
        producers = config.producers,
        consumers = config.consumers,
        initial_capacity = config.initial_capacity,
        items_per_producer = config.items_per_producer,
        "starting run"
    );
    let start = Instant::now();

    let mut workers = Workers::default();
    let mut spawn_error = None;
    for id in 0..config.producers {
        let monitor = Arc::clone(&monitor);
        let observer = Arc::clone(&observer);
        let config = config.clone();
        let spawned = thread::Builder::new()
            .name(format!("producer-{id}"))
            .spawn(move || produce_items(&monitor, observer.as_ref(), &config, id));
        match spawned {
            Ok(handle) => workers.producers.push(handle),
            Err(e) => {
                spawn_error = Some(e);
                break;
            }
        }
    }

    if spawn_error.is_none() {
        for id in 0..config.consumers {
            let monitor = Arc::clone(&monitor);
            let observer = Arc::clone(&observer);
            let budget = config.consumer_budget();
            let spawned = thread::Builder::new()
                .name(format!("consumer-{id}"))
                .spawn(move || consume_items(&monitor, observer.as_ref(), budget, id));
            match spawned {
                Ok(handle) => workers.consumers.push(handle),
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }
    }

    // threads that did start are always shut down and joined, even when a
    // later spawn failed
    let (producers, consumers, failure) = workers.join_all(&monitor);
    if let Some(e) = spawn_error {
        warn!(error = %e, "failed to spawn worker thread");
        return Err(e.into());
    }
    if let Some(err) = failure {
        return Err(err);
    }

    let report = RunReport {
        config: config.clone(),
        total_produced: producers.iter().map(|p| p.produced).sum(),
        total_consumed: consumers.iter().map(|c| c.consumed).sum(),
        producers,
        consumers,
        final_stats: monitor.stats(),
        elapsed_ms: start.elapsed().as_millis(),
    };

    info!(
        produced = report.total_produced,
        consumed = report.total_consumed,
        final_capacity = report.final_stats.capacity,
        resizes = report.final_stats.resizes,
        elapsed_ms = report.elapsed_ms as u64,
        "run complete"
    );
    Ok(report)
}

#[derive(Default)]
struct Workers {
    producers: Vec<JoinHandle<ProducerReport>>,
    consumers: Vec<JoinHandle<ConsumerReport>>,
}

impl Workers {
    // Joins every producer, marks producers done, then joins every consumer.
    // Returns the first panic seen, if any.
    fn join_all(
        self,
        monitor: &Monitor,
    ) -> (Vec<ProducerReport>, Vec<ConsumerReport>, Option<DriverError>) {
        let mut failure = None;
        let mut producers = Vec::with_capacity(self.producers.len());
        for (id, handle) in self.producers.into_iter().enumerate() {
            match handle.join() {
                Ok(report) => producers.push(report),
                Err(_) => {
                    warn!(producer = id, "producer thread panicked");
                    if failure.is_none() {
                        failure = Some(DriverError::WorkerPanicked(format!("producer {id}")));
                    }
                }
            }
        }

        // every producer has returned, so no produce() is in flight
        monitor.set_producers_done();

        let mut consumers = Vec::with_capacity(self.consumers.len());
        for (id, handle) in self.consumers.into_iter().enumerate() {
            match handle.join() {
                Ok(report) => consumers.push(report),
                Err(_) => {
                    warn!(consumer = id, "consumer thread panicked");
                    if failure.is_none() {
                        failure = Some(DriverError::WorkerPanicked(format!("consumer {id}")));
                    }
                }
            }
        }

        (producers, consumers, failure)
    }
}

fn produce_items(
    monitor: &Monitor,
    observer: &dyn Observer,
    config: &DriverConfig,
    producer: usize,
) -> ProducerReport {
    let mut rng = rand::thread_rng();
    for index in 0..config.items_per_producer {
        let item = item_for(producer, index);
        monitor.produce(item);
        observer.on_event(&MonitorEvent::Produced { producer, item });

        let mut pause = config.produce_delay_ms;
        if config.produce_jitter_ms > 0 {
            pause += rng.gen_range(0..=config.produce_jitter_ms);
        }
        if pause > 0 {
            thread::sleep(Duration::from_millis(pause));
        }
    }

    let produced = config.items_per_producer;
    observer.on_event(&MonitorEvent::ProducerFinished { producer, produced });
    ProducerReport { producer, produced }
}

fn consume_items(
    monitor: &Monitor,
    observer: &dyn Observer,
    budget: Duration,
    consumer: usize,
) -> ConsumerReport {
    let start = Instant::now();
    let mut items = Vec::new();

    let reason = loop {
        // advisory: consume() below is still the authoritative check
        if monitor.producers_done() && monitor.is_empty() {
            break ExitReason::ObservedEmpty;
        }

        let item = monitor.consume();
        if item == NO_MORE_ITEMS {
            observer.on_event(&MonitorEvent::FoundNone { consumer });
            break ExitReason::Drained;
        }
        items.push(item);
        observer.on_event(&MonitorEvent::Consumed { consumer, item });

        if start.elapsed() > budget {
            break ExitReason::BudgetElapsed;
        }
    };

    let consumed = items.len();
    observer.on_event(&MonitorEvent::ConsumerFinished {
        consumer,
        consumed,
        reason,
    });
    ConsumerReport {
        consumer,
        consumed,
        reason,
        items,
    }
}

impl RunReport {
    /// Items produced but never consumed, because consumer budgets ran out.
    pub fn left_in_buffer(&self) -> usize {
        self.final_stats.len
    }

    pub fn render(&self) -> String {
        let mut report = String::new();
        report.push_str("# Monitor Run\n\n");
        report.push_str(&format!("- Producers: {}\n", self.config.producers));
        report.push_str(&format!("- Consumers: {}\n", self.config.consumers));
        report.push_str(&format!(
            "- Initial capacity: {}\n",
            self.config.initial_capacity
        ));
        report.push_str(&format!(
            "- Final capacity: {} ({} resizes)\n",
            self.final_stats.capacity, self.final_stats.resizes
        ));
        report.push_str(&format!("- Elapsed: {} ms\n\n", self.elapsed_ms));

        report.push_str("| Consumer | Consumed | Exit |\n");
        report.push_str("|----------|----------|------|\n");
        for c in &self.consumers {
            report.push_str(&format!("| {} | {} | {:?} |\n", c.consumer, c.consumed, c.reason));
        }
        report.push('\n');

        report.push_str(&format!(
            "Produced {}, consumed {}, left in buffer {}\n",
            self.total_produced,
            self.total_consumed,
            self.left_in_buffer()
        ));
        report
    }
}
