use std::fmt;

/// How a [`TaskQueue`](super::TaskQueue) hosts its run loop.
///
/// The strategy is fixed when the queue is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionStrategy {
    /// `start` spawns a worker thread named after the queue and returns
    /// immediately.
    #[default]
    DedicatedThread,

    /// `start` runs the loop on the calling thread and only returns once
    /// the queue has been stopped.
    ///
    /// Lets an application's main or UI thread host a queue without
    /// owning a separate thread.
    CallerDriven,
}

impl ExecutionStrategy {
    /// Returns `true` if `start` blocks the caller for the loop's lifetime.
    pub fn blocks_caller(self) -> bool {
        matches!(self, ExecutionStrategy::CallerDriven)
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStrategy::DedicatedThread => f.write_str("dedicated-thread"),
            ExecutionStrategy::CallerDriven => f.write_str("caller-driven"),
        }
    }
}
