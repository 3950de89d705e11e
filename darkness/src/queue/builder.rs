use super::{ExecutionStrategy, TaskQueue};
use crate::error::{Error, Result};
use crate::task::ExceptionHandler;

use std::sync::Arc;

/// Builder for configuring and creating a [`TaskQueue`].
///
/// # Examples
///
/// ```rust
/// use darkness::{ExecutionStrategy, QueueBuilder, debug_exception_handler};
///
/// let queue = QueueBuilder::new("render")
///     .strategy(ExecutionStrategy::DedicatedThread)
///     .exception_handler(debug_exception_handler())
///     .build()
///     .unwrap();
///
/// assert_eq!(queue.name(), "render");
/// ```
pub struct QueueBuilder {
    /// Name of the queue and of its worker thread.
    name: String,

    /// Optional failure callback.
    handler: Option<ExceptionHandler>,

    /// Where the run loop is hosted.
    strategy: ExecutionStrategy,
}

impl QueueBuilder {
    /// Creates a builder for a dedicated-thread queue without handler.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: None,
            strategy: ExecutionStrategy::default(),
        }
    }

    pub fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the callback receiving task failures.
    pub fn exception_handler(mut self, handler: ExceptionHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Convenience wrapper around [`exception_handler`](Self::exception_handler)
    /// for plain closures.
    pub fn on_error<F>(self, f: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.exception_handler(Arc::new(f))
    }

    /// Builds the queue. The queue is not started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyName`] if the name is empty.
    pub fn build(self) -> Result<TaskQueue> {
        TaskQueue::new(self.name, self.handler, self.strategy)
    }
}
