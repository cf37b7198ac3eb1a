//! Work queue and worker pool
//!
//! Classifiers enqueue typed work items; a fixed pool of workers drains the
//! queue and dispatches each item to its registered handler. One bad item
//! never stops the pipeline: dispatch and handler failures are logged and
//! the item dropped.

pub mod handlers;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use matchbook_common::model::Person;
use matchbook_common::Result;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Typed unit of deferred processing.
///
/// A closed enumeration instead of the open string-keyed dispatch the
/// capture path would otherwise invite: a work type that exists but has no
/// registered handler is an explicit, logged error path.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// A profile surfaced in the recommendations feed
    AddRec(Person),
    /// A profile surfaced in the matches list
    AddMatch(Person),
    /// The user liked the given profile id
    Like(String),
    /// The user passed on the given profile id
    Dislike(String),
}

/// Dispatch tag of a [`WorkItem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    AddRec,
    AddMatch,
    Like,
    Dislike,
}

impl WorkItem {
    pub fn kind(&self) -> WorkKind {
        match self {
            WorkItem::AddRec(_) => WorkKind::AddRec,
            WorkItem::AddMatch(_) => WorkKind::AddMatch,
            WorkItem::Like(_) => WorkKind::Like,
            WorkItem::Dislike(_) => WorkKind::Dislike,
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkKind::AddRec => "add_rec",
            WorkKind::AddMatch => "add_match",
            WorkKind::Like => "like",
            WorkKind::Dislike => "dislike",
        };
        f.write_str(name)
    }
}

/// Handler for one kind of work item
#[async_trait]
pub trait WorkHandler: Send + Sync {
    async fn handle(&self, item: WorkItem) -> Result<()>;
}

/// Multi-producer handle onto the work queue.
///
/// Unbounded: capture must never block on downstream processing
/// backpressure; profile tracking is best-effort, not delivery-guaranteed.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<WorkItem>,
}

impl WorkQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkItem>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Non-blocking enqueue. Items submitted after the pool has shut down
    /// are dropped with a warning.
    pub fn submit(&self, item: WorkItem) {
        let kind = item.kind();
        if self.tx.send(item).is_err() {
            warn!("work queue closed, dropping `{}` item", kind);
        }
    }
}

/// Fixed pool of workers draining the work queue.
pub struct WorkerPool {
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers over the queue receiver.
    ///
    /// The handler registry is fixed at startup; registration changes after
    /// start are not supported.
    pub fn start(
        handlers: HashMap<WorkKind, Arc<dyn WorkHandler>>,
        rx: mpsc::UnboundedReceiver<WorkItem>,
        worker_count: usize,
    ) -> Self {
        let handlers = Arc::new(handlers);
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = CancellationToken::new();

        let workers = (0..worker_count)
            .map(|i| {
                let handlers = Arc::clone(&handlers);
                let rx = Arc::clone(&rx);
                let shutdown = shutdown.clone();
                tokio::spawn(worker_loop(i + 1, handlers, rx, shutdown))
            })
            .collect();

        info!("Worker pool started with {} workers", worker_count);

        Self { shutdown, workers }
    }

    /// Cancel every worker and wait for them to exit.
    ///
    /// The cancellation token is observed by all workers, so one shutdown
    /// request stops the whole pool. Each worker finishes its in-flight
    /// item first; items still queued are left unprocessed.
    pub async fn shutdown(self) {
        self.shutdown.cancel();

        for (i, handle) in self.workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("Worker {} join failed: {}", i + 1, e);
            }
        }

        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    handlers: Arc<HashMap<WorkKind, Arc<dyn WorkHandler>>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    shutdown: CancellationToken,
) {
    debug!("Worker {} started", worker_id);

    loop {
        // Workers only exit between items, never while a handler holds a
        // partially-applied mutation. Biased: once shutdown is requested,
        // no worker pulls another item.
        let item = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Worker {} received shutdown signal", worker_id);
                break;
            }
            item = async { rx.lock().await.recv().await } => item,
        };

        let Some(item) = item else {
            debug!("Worker {} queue closed", worker_id);
            break;
        };

        dispatch(worker_id, &handlers, item).await;
    }

    debug!("Worker {} exiting", worker_id);
}

async fn dispatch(
    worker_id: usize,
    handlers: &HashMap<WorkKind, Arc<dyn WorkHandler>>,
    item: WorkItem,
) {
    let kind = item.kind();
    match handlers.get(&kind) {
        Some(handler) => {
            if let Err(e) = handler.handle(item).await {
                // Item dropped, no automatic re-enqueue; the worker lives on
                error!("Worker {} handler failed for `{}`: {}", worker_id, kind, e);
            }
        }
        None => {
            error!("No handler registered for work kind `{}`, dropping item", kind);
        }
    }
}
