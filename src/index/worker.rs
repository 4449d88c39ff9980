//! Background indexing driven by record-insert events.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Notify};

use crate::index::IndexBuilder;
use crate::observability::metrics;
use crate::store::SnapshotId;

/// A persisted record that needs indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    Subscription { snapshot: SnapshotId, id: String },
    Product { snapshot: SnapshotId, id: String },
}

impl IndexEvent {
    pub fn trigger(&self) -> &'static str {
        match self {
            IndexEvent::Subscription { .. } => "subscription",
            IndexEvent::Product { .. } => "product",
        }
    }
}

/// Publishing side of the index event channel.
///
/// Tracks in-flight events so loaders can wait for a snapshot's index to settle.
#[derive(Debug, Clone)]
pub struct IndexQueue {
    tx: mpsc::UnboundedSender<IndexEvent>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl IndexQueue {
    /// Create a queue and the receiver an [`IndexWorker`] consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<IndexEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                in_flight: Arc::new(AtomicUsize::new(0)),
                idle: Arc::new(Notify::new()),
            },
            rx,
        )
    }

    /// Queue an event. Never blocks the writer.
    pub fn publish(&self, event: IndexEvent) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(event = ?e.0, "Index worker gone, event dropped");
            self.complete();
        }
    }

    /// Events published but not yet processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every published event has been processed.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn complete(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Consumes index events, one task per event.
pub struct IndexWorker {
    builder: IndexBuilder,
    queue: IndexQueue,
    rx: mpsc::UnboundedReceiver<IndexEvent>,
}

impl IndexWorker {
    pub fn new(builder: IndexBuilder, queue: IndexQueue, rx: mpsc::UnboundedReceiver<IndexEvent>) -> Self {
        Self { builder, queue, rx }
    }

    /// Run until shutdown or until every publisher is gone.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Index worker starting");
        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    let Some(event) = event else { break };
                    let builder = self.builder.clone();
                    let queue = self.queue.clone();
                    tokio::spawn(async move {
                        process(&builder, &event);
                        queue.complete();
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Index worker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Build entries for one event; failures are logged and counted, never propagated.
pub fn process(builder: &IndexBuilder, event: &IndexEvent) {
    match builder.handle(event) {
        Ok(written) => {
            metrics::record_index_build(event.trigger(), true);
            metrics::record_route_entries_written(written);
        }
        Err(e) => {
            metrics::record_index_build(event.trigger(), false);
            tracing::error!(event = ?event, error = %e, "Index build failed");
        }
    }
}
