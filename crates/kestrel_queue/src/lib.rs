//! Bounded-concurrency async work queue.
//!
//! Tasks accumulate until [`WorkQueue::start`] and then drain with at most
//! `parallel` tasks in flight. [`WorkQueue::stop`] stops picking new tasks
//! while running ones finish; [`WorkQueue::clear`] drops queued tasks and
//! rejects their completion futures with [`QueueError::Cancelled`].

use std::{
    collections::VecDeque,
    future::Future,
    num::NonZeroUsize,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

/// Errors surfaced through a task's completion future.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The task was dropped by [`WorkQueue::clear`] before it ran.
    #[error("task was cancelled before it could run")]
    Cancelled,

    /// The queue was dropped while the task was still queued or running.
    #[error("queue was dropped before the task completed")]
    Closed,
}

struct Pending<T> {
    key: Option<String>,
    task: BoxFuture<'static, T>,
    done: oneshot::Sender<Result<T, QueueError>>,
}

struct State<T> {
    started: bool,
    running: usize,
    pending: VecDeque<Pending<T>>,
}

struct Shared<T> {
    parallel: usize,
    state: Mutex<State<T>>,
}

/// A FIFO task queue that runs at most `parallel` tasks concurrently.
///
/// Tasks are spawned onto the ambient Tokio runtime; every queue method must
/// therefore be called from within one.
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Creates a stopped queue with the given concurrency bound.
    pub fn new(parallel: NonZeroUsize) -> Self {
        Self {
            shared: Arc::new(Shared {
                parallel: parallel.get(),
                state: Mutex::new(State {
                    started: false,
                    running: 0,
                    pending: VecDeque::new(),
                }),
            }),
        }
    }

    /// Adds a task and returns its completion future.
    ///
    /// The future resolves with the task's output once it has run, or with
    /// [`QueueError::Cancelled`] if the task is cleared first. `key` is
    /// opaque; tasks sharing a key keep their enqueue order.
    pub fn enqueue(
        &self,
        task: impl Future<Output = T> + Send + 'static,
        key: Option<&str>,
    ) -> EnqueuedTask<T> {
        let (done, receiver) = oneshot::channel();
        {
            let mut state = self.shared.state.lock();
            state.pending.push_back(Pending {
                key: key.map(str::to_owned),
                task: Box::pin(task),
                done,
            });
        }
        self.pump();
        EnqueuedTask { receiver }
    }

    /// Begins draining the queue.
    pub fn start(&self) {
        self.shared.state.lock().started = true;
        self.pump();
    }

    /// Stops picking new tasks. Running tasks finish undisturbed.
    pub fn stop(&self) {
        self.shared.state.lock().started = false;
    }

    /// Drops every queued (not running) task, rejecting its completion
    /// future with the cancellation marker.
    pub fn clear(&self) {
        let dropped: Vec<Pending<T>> = {
            let mut state = self.shared.state.lock();
            state.pending.drain(..).collect()
        };
        for pending in dropped {
            trace!(key = pending.key.as_deref(), "cancelling queued task");
            let _ = pending.done.send(Err(QueueError::Cancelled));
        }
    }

    /// Number of tasks that are queued or currently running.
    pub fn size(&self) -> usize {
        let state = self.shared.state.lock();
        state.running + state.pending.len()
    }

    /// Picks tasks while capacity allows.
    fn pump(&self) {
        loop {
            let next = {
                let mut state = self.shared.state.lock();
                if !state.started || state.running >= self.shared.parallel {
                    return;
                }
                let Some(next) = state.pending.pop_front() else {
                    return;
                };
                state.running += 1;
                next
            };

            let queue = self.clone();
            tokio::spawn(async move {
                trace!(key = next.key.as_deref(), "task started");
                let output = next.task.await;
                let _ = next.done.send(Ok(output));
                queue.shared.state.lock().running -= 1;
                queue.pump();
            });
        }
    }
}

/// Completion future returned by [`WorkQueue::enqueue`].
pub struct EnqueuedTask<T> {
    receiver: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> Future for EnqueuedTask<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(QueueError::Closed)),
            Poll::Pending => Poll::Pending,
        }
    }
}
