// Bounded Worker Pool
//
// A fixed set of persistent workers drains a bounded task queue. Submitting to
// a full queue waits for a free slot, so a large batch never spawns more than
// `max_concurrency` concurrent units of work.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{Instrument, Span};

type Task = BoxFuture<'static, ()>;

/// Run `future` to completion, turning a panic into `None`.
///
/// Every concurrently executed unit of work in the inspector goes through
/// this helper: pool tasks and the orchestrator's jobs alike.
pub async fn contain_panic<F, T>(label: &str, future: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::error!("{} panicked: {}", label, panic_message(payload.as_ref()));
            None
        }
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    panicked: AtomicUsize,
}

/// Totals returned by [`WorkerPool::wait`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub submitted: usize,
    pub completed: usize,
    pub panicked: usize,
}

/// Fixed-size pool of persistent workers
pub struct WorkerPool {
    sender: mpsc::Sender<Task>,
    workers: JoinSet<()>,
    counters: Arc<Counters>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool whose workers log under the current span
    pub fn new(max_concurrency: usize) -> Self {
        Self::with_span(max_concurrency, Span::current())
    }

    /// Create a pool whose workers log under `span`
    pub fn with_span(max_concurrency: usize, span: Span) -> Self {
        let size = max_concurrency.max(1);
        let (sender, receiver) = mpsc::channel::<Task>(size);
        let queue = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let mut workers = JoinSet::new();
        for worker_id in 0..size {
            let queue = Arc::clone(&queue);
            let counters = Arc::clone(&counters);
            workers.spawn(work(worker_id, queue, counters).instrument(span.clone()));
        }

        Self {
            sender,
            workers,
            counters,
            size,
        }
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.size
    }

    /// Enqueue one unit of work, waiting while the queue is full
    pub async fn add<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.sender.send(Box::pin(task)).await.is_err() {
            // Workers hold the receiver until the sender is dropped in `wait`.
            tracing::error!("Worker pool queue closed, task dropped");
            return;
        }
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
    }

    /// Close the queue and block until every submitted task has run.
    ///
    /// Consumes the pool, so nothing can be added afterwards.
    pub async fn wait(self) -> PoolReport {
        let WorkerPool {
            sender,
            mut workers,
            counters,
            ..
        } = self;

        drop(sender);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Pool worker failed: {}", e);
            }
        }

        PoolReport {
            submitted: counters.submitted.load(Ordering::SeqCst),
            completed: counters.completed.load(Ordering::SeqCst),
            panicked: counters.panicked.load(Ordering::SeqCst),
        }
    }
}

async fn work(worker_id: usize, queue: Arc<Mutex<mpsc::Receiver<Task>>>, counters: Arc<Counters>) {
    loop {
        let next = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };

        let Some(task) = next else {
            break;
        };

        let label = format!("pool worker {}", worker_id);
        if contain_panic(&label, task).await.is_none() {
            counters.panicked.fetch_add(1, Ordering::SeqCst);
        }
        counters.completed.fetch_add(1, Ordering::SeqCst);
    }

    tracing::trace!("pool worker {} exiting", worker_id);
}
