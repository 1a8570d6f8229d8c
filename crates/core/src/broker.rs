//! Message transport seam and the in-process broker.
//!
//! The orchestrator only depends on the send side ([`MessageBroker`]);
//! delivery mechanics live behind it. [`MemoryBroker`] is the in-process
//! implementation used by the server binary and the test suite: three FIFO
//! queues with notify wakeups, a push-front requeue for the unacknowledged
//! backpressure path, and delayed job sends for the terminal cleanup step.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;

use crate::messages::{ControlMessage, JobMessage, OperationMessage};

/// Error type for transport sends.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("message transport unavailable: {0}")]
    Unavailable(String),
}

/// Send side of the message transport.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Enqueue an operation message on the control-plane queue.
    async fn send_operation(&self, msg: OperationMessage) -> Result<(), BrokerError>;

    /// Enqueue a job message on the work queue, optionally after a delay.
    async fn send_job(&self, msg: JobMessage, delay: Option<Duration>) -> Result<(), BrokerError>;

    /// Enqueue a pipeline control message.
    async fn send_control(&self, msg: ControlMessage) -> Result<(), BrokerError>;
}

/// One FIFO queue with wakeups.
struct Channel<T> {
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> Channel<T> {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn push_back(&self, item: T) {
        self.queue.lock().unwrap().push_back(item);
        self.notify.notify_one();
    }

    fn push_front(&self, item: T) {
        self.queue.lock().unwrap().push_front(item);
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Option<T> {
        self.queue.lock().unwrap().pop_front()
    }

    async fn recv(&self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }
}

struct BrokerInner {
    operations: Channel<OperationMessage>,
    jobs: Channel<JobMessage>,
    control: Channel<ControlMessage>,
}

/// In-process message broker.
///
/// Cheaply cloneable; clones share the same queues. Not durable and not
/// visible across processes.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                operations: Channel::new(),
                jobs: Channel::new(),
                control: Channel::new(),
            }),
        }
    }

    /// Await the next operation message.
    pub async fn recv_operation(&self) -> OperationMessage {
        self.inner.operations.recv().await
    }

    /// Await the next job message.
    pub async fn recv_job(&self) -> JobMessage {
        self.inner.jobs.recv().await
    }

    /// Await the next control message.
    pub async fn recv_control(&self) -> ControlMessage {
        self.inner.control.recv().await
    }

    /// Return a job message to the head of the work queue.
    ///
    /// Used when consumption is quieted: the message was not acknowledged and
    /// must be redelivered later, in order.
    pub fn requeue_job(&self, msg: JobMessage) {
        self.inner.jobs.push_front(msg);
    }

    /// Pop without waiting; test hook.
    pub fn try_recv_job(&self) -> Option<JobMessage> {
        self.inner.jobs.try_pop()
    }

    /// Pop without waiting; test hook.
    pub fn try_recv_operation(&self) -> Option<OperationMessage> {
        self.inner.operations.try_pop()
    }

    /// Number of undelivered operation messages.
    pub fn pending_operations(&self) -> usize {
        self.inner.operations.len()
    }

    /// Number of undelivered job messages.
    pub fn pending_jobs(&self) -> usize {
        self.inner.jobs.len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn send_operation(&self, msg: OperationMessage) -> Result<(), BrokerError> {
        self.inner.operations.push_back(msg);
        Ok(())
    }

    async fn send_job(&self, msg: JobMessage, delay: Option<Duration>) -> Result<(), BrokerError> {
        match delay {
            None => self.inner.jobs.push_back(msg),
            Some(delay) => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.jobs.push_back(msg);
                });
            }
        }
        Ok(())
    }

    async fn send_control(&self, msg: ControlMessage) -> Result<(), BrokerError> {
        self.inner.control.push_back(msg);
        Ok(())
    }
}
