//! Periodic timer.
//!
//! [`PeriodicTimer`] shares the start/stop contract of
//! [`TaskQueue`](crate::TaskQueue) but runs a single task repeatedly on
//! its own thread, and its `stop` waits for that thread to exit.

mod builder;
mod core;
mod worker;

pub use self::core::PeriodicTimer;
pub use builder::{Delay, DelayProvider, FailurePolicy, TimerBuilder};
pub use worker::FALLBACK_DELAY;
