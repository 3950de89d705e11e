//! Process-wide registry of named queues.
//!
//! The registry maps names to shared queue handles with get-or-create
//! semantics. One reserved name, [`MAIN_QUEUE_NAME`], designates the
//! main queue, which is always caller-driven so that the application's
//! primary thread can host it.
//!
//! Forgetting a name never stops the queue by itself: handles held
//! elsewhere keep the queue alive and running. A queue whose last handle
//! was the registry's is stopped when that handle is released.

use crate::error::Result;
use crate::queue::{ExecutionStrategy, TaskQueue};
use crate::task::ExceptionHandler;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to a queue.
///
/// A handle stays valid after the registry forgets its name.
pub type QueueHandle = Arc<TaskQueue>;

/// Reserved name of the main queue.
pub const MAIN_QUEUE_NAME: &str = "Darkness.Concurrency.MainQueue";

static GLOBAL: Lazy<QueueRegistry> = Lazy::new(QueueRegistry::new);

/// Name → queue mapping guarded by a single lock.
///
/// Lookups and inserts are atomic with respect to each other, so two
/// callers can never create two distinct queues under one name.
#[derive(Default)]
pub struct QueueRegistry {
    queues: Mutex<HashMap<String, QueueHandle>>,
}

impl QueueRegistry {
    /// Creates an empty, independent registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> &'static QueueRegistry {
        &GLOBAL
    }

    /// Returns the queue registered under `name`, creating a stopped
    /// dedicated-thread queue with `handler` if there is none.
    ///
    /// `handler` is ignored when the queue already exists. The reserved
    /// [`MAIN_QUEUE_NAME`] always yields a caller-driven queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyName`](crate::Error::EmptyName) if `name` is empty.
    pub fn get_or_create_background(
        &self,
        name: &str,
        handler: Option<ExceptionHandler>,
    ) -> Result<QueueHandle> {
        let mut queues = self.queues.lock();

        if let Some(queue) = queues.get(name) {
            return Ok(Arc::clone(queue));
        }

        let strategy = if name == MAIN_QUEUE_NAME {
            ExecutionStrategy::CallerDriven
        } else {
            ExecutionStrategy::DedicatedThread
        };

        let queue = Arc::new(TaskQueue::new(name, handler, strategy)?);
        queues.insert(name.to_owned(), Arc::clone(&queue));

        tracing::debug!(queue = name, %strategy, "queue registered");

        Ok(queue)
    }

    /// Returns the main queue, creating it if needed.
    ///
    /// The main queue is caller-driven: whichever thread calls `start` on
    /// it hosts its loop until it is stopped.
    pub fn get_or_create_main(&self, handler: Option<ExceptionHandler>) -> QueueHandle {
        let mut queues = self.queues.lock();

        if let Some(queue) = queues.get(MAIN_QUEUE_NAME) {
            return Arc::clone(queue);
        }

        let queue = Arc::new(TaskQueue::from_parts(
            MAIN_QUEUE_NAME,
            handler,
            ExecutionStrategy::CallerDriven,
        ));
        queues.insert(MAIN_QUEUE_NAME.to_owned(), Arc::clone(&queue));

        tracing::debug!(queue = MAIN_QUEUE_NAME, "main queue registered");

        queue
    }

    /// Returns the queue registered under `name` without creating one.
    pub fn get(&self, name: &str) -> Option<QueueHandle> {
        self.queues.lock().get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.queues.lock().contains_key(name)
    }

    pub fn is_main_registered(&self) -> bool {
        self.is_registered(MAIN_QUEUE_NAME)
    }

    /// Removes `name` from the registry without stopping its queue.
    ///
    /// The name may afterwards be reused by a new, distinct queue.
    pub fn forget_by_name(&self, name: &str) {
        let removed = self.queues.lock().remove(name);

        if removed.is_some() {
            tracing::debug!(queue = name, "queue forgotten");
        }

        // Released outside the lock: a last handle stops its queue on drop.
        drop(removed);
    }

    pub fn forget_main(&self) {
        self.forget_by_name(MAIN_QUEUE_NAME);
    }

    /// Forgets every registered name.
    ///
    /// Queues still referenced elsewhere keep running.
    pub fn kill_and_forget_all(&self) {
        let removed = std::mem::take(&mut *self.queues.lock());

        tracing::debug!(count = removed.len(), "all queues forgotten");

        drop(removed);
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.lock().is_empty()
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.queues.lock().keys().cloned().collect()
    }
}
