//! Named FIFO task queues.
//!
//! This module contains:
//! - [`TaskQueue`]: the queue itself and its start/stop state machine,
//! - [`ExecutionStrategy`]: where a queue's run loop is hosted,
//! - [`QueueBuilder`]: configuration of a new queue,
//! - the run loop shared by both strategies.

mod builder;
mod core;
mod strategy;
mod worker;

pub use builder::QueueBuilder;
pub use self::core::TaskQueue;
pub use strategy::ExecutionStrategy;
