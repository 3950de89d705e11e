//! # Darkness
//!
//! **Darkness** is the execution backbone for applications that combine
//! background workers with an event loop owned by the main thread.
//!
//! It provides:
//!
//! - **Named FIFO task queues** whose run loop is either hosted by a
//!   dedicated worker thread or by whichever thread calls `start`
//! - A **process-wide registry** handing out shared queue handles by name,
//!   including a reserved, caller-driven *main* queue
//! - A **periodic timer** with a fixed or dynamically computed delay
//!
//! All of them follow the same lifecycle, [`AsyncState`]:
//! `Free → Busy → Stopping → Stopped`, and may be restarted once stopped.
//! Failures inside tasks never escape to the caller; they are turned into
//! [`Error`] values and passed to the component's exception handler.
//!
//! ## Quick Start
//!
//! ```rust
//! use darkness::QueueRegistry;
//! use std::sync::mpsc;
//!
//! let registry = QueueRegistry::global();
//! let queue = registry.get_or_create_background("quick-start", None).unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! queue.post(move || tx.send("done").unwrap());
//! queue.start();
//!
//! assert_eq!(rx.recv().unwrap(), "done");
//!
//! queue.stop();
//! registry.forget_by_name("quick-start");
//! ```
//!
//! ## Hosting the main queue
//!
//! ```rust,no_run
//! use darkness::QueueRegistry;
//!
//! let main_queue = QueueRegistry::global().get_or_create_main(None);
//! let handle = main_queue.clone();
//!
//! main_queue.post(move || {
//!     // ... application work on the main thread ...
//!     handle.stop();
//! });
//!
//! // Blocks until the queue is stopped.
//! main_queue.start();
//! ```
//!
//! ## Modules
//!
//! - [`queue`]: task queues and execution strategies
//! - [`registry`]: the named-queue registry
//! - [`timer`]: the periodic timer

mod error;
mod state;
mod task;
mod thread;

pub mod queue;
pub mod registry;
pub mod timer;

pub use error::{Error, ErrorKind, Result};
pub use queue::{ExecutionStrategy, QueueBuilder, TaskQueue};
pub use registry::{MAIN_QUEUE_NAME, QueueHandle, QueueRegistry};
pub use state::{AsyncControl, AsyncState};
pub use task::{ExceptionHandler, Task, TimerTask, debug_exception_handler};
pub use thread::{async_call, set_current_thread_name};
pub use timer::{Delay, DelayProvider, FailurePolicy, PeriodicTimer, TimerBuilder};
