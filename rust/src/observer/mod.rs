//! Structured events and the observers that receive them.
//!
//! The Monitor reports resizes; the driver reports what producers and
//! consumers did. Observers are always called with no Monitor lock held, so a
//! slow observer only slows down the thread that emitted the event.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    // consume() returned the no-more-items sentinel
    Drained,
    // producers were done and the buffer looked empty before calling consume()
    ObservedEmpty,
    // the consumer's own time budget ran out
    BudgetElapsed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    Resized { from: usize, to: usize, len: usize },
    Produced { producer: usize, item: Item },
    Consumed { consumer: usize, item: Item },
    FoundNone { consumer: usize },
    ProducerFinished { producer: usize, produced: usize },
    ConsumerFinished { consumer: usize, consumed: usize, reason: ExitReason },
    ProducersDone,
}

pub trait Observer: Send + Sync {
    fn on_event(&self, event: &MonitorEvent);
}

pub struct NullObserver;

impl Observer for NullObserver {
    fn on_event(&self, _: &MonitorEvent) {}
}

/// Forwards every event to `tracing`, under the `elasticbuf` target.
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &MonitorEvent) {
        match *event {
            MonitorEvent::Resized { from, to, len } => {
                tracing::info!(target: "elasticbuf", from, to, len, "buffer resized to {}", to)
            }
            MonitorEvent::Produced { producer, item } => {
                tracing::debug!(target: "elasticbuf", producer, item, "produced")
            }
            MonitorEvent::Consumed { consumer, item } => {
                tracing::debug!(target: "elasticbuf", consumer, item, "consumed")
            }
            MonitorEvent::FoundNone { consumer } => {
                tracing::debug!(target: "elasticbuf", consumer, "found no item")
            }
            MonitorEvent::ProducerFinished { producer, produced } => {
                tracing::info!(target: "elasticbuf", producer, produced, "producer finished")
            }
            MonitorEvent::ConsumerFinished {
                consumer,
                consumed,
                reason,
            } => {
                tracing::info!(target: "elasticbuf", consumer, consumed, ?reason, "consumer finished")
            }
            MonitorEvent::ProducersDone => {
                tracing::info!(target: "elasticbuf", "all producers done")
            }
        }
    }
}

// Keeps every event in memory, in arrival order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<MonitorEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().clone()
    }
}

impl Observer for RecordingObserver {
    fn on_event(&self, event: &MonitorEvent) {
        self.events.lock().push(event.clone());
    }
}

pub struct Fanout {
    observers: Vec<Arc<dyn Observer>>,
}

impl Fanout {
    pub fn new(observers: Vec<Arc<dyn Observer>>) -> Self {
        Fanout { observers }
    }
}

impl Observer for Fanout {
    fn on_event(&self, event: &MonitorEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Appends events as JSON lines to a file from a dedicated writer thread.
///
/// `on_event` only pushes onto an unbounded channel. The writer thread exits
/// once every `EventLog` clone is dropped; [`EventLogWriter::finish`] waits for
/// that and reports any I/O error it hit.
#[derive(Clone)]
pub struct EventLog {
    tx: flume::Sender<MonitorEvent>,
}

pub struct EventLogWriter {
    handle: JoinHandle<std::io::Result<usize>>,
}

impl EventLog {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<(EventLog, EventLogWriter)> {
        let file = File::create(path.as_ref())?;
        let (tx, rx) = flume::unbounded::<MonitorEvent>();

        let handle = thread::Builder::new()
            .name("event-log".to_string())
            .spawn(move || -> std::io::Result<usize> {
                let mut out = BufWriter::new(file);
                let mut written = 0usize;
                for event in rx.iter() {
                    serde_json::to_writer(&mut out, &event)?;
                    out.write_all(b"\n")?;
                    written += 1;
                }
                out.flush()?;
                Ok(written)
            })?;

        Ok((EventLog { tx }, EventLogWriter { handle }))
    }
}

impl Observer for EventLog {
    fn on_event(&self, event: &MonitorEvent) {
        // only fails once the writer thread is gone, and it has already
        // reported its own error by then
        let _ = self.tx.send(event.clone());
    }
}

impl EventLogWriter {
    // Blocks until all EventLog handles are dropped and the file is flushed.
    // Returns the number of events written.
    pub fn finish(self) -> std::io::Result<usize> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::other("event log writer panicked")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = MonitorEvent::Resized {
            from: 4,
            to: 8,
            len: 4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "resized", "from": 4, "to": 8, "len": 4})
        );

        let event = MonitorEvent::ConsumerFinished {
            consumer: 1,
            consumed: 3,
            reason: ExitReason::BudgetElapsed,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"reason\":\"budget_elapsed\""));
    }

    #[test]
    fn test_fanout_reaches_every_observer() {
        let a = Arc::new(RecordingObserver::new());
        let b = Arc::new(RecordingObserver::new());
        let fanout = Fanout::new(vec![
            a.clone() as Arc<dyn Observer>,
            b.clone(),
            Arc::new(NullObserver),
        ]);

        fanout.on_event(&MonitorEvent::ProducersDone);
        fanout.on_event(&MonitorEvent::FoundNone { consumer: 2 });

        assert_eq!(a.events().len(), 2);
        assert_eq!(a.events(), b.events());
    }

    #[test]
    fn test_event_log_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");

        let (log, writer) = EventLog::create(&path).unwrap();
        let clone = log.clone();
        log.on_event(&MonitorEvent::Produced {
            producer: 0,
            item: 7,
        });
        clone.on_event(&MonitorEvent::Consumed {
            consumer: 0,
            item: 7,
        });
        drop(log);
        drop(clone);

        assert_eq!(writer.finish().unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let events: Vec<MonitorEvent> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                MonitorEvent::Produced {
                    producer: 0,
                    item: 7
                },
                MonitorEvent::Consumed {
                    consumer: 0,
                    item: 7
                },
            ]
        );
    }
}
