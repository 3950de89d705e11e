//! Task and handler types shared by queues and timers.

use crate::error::Error;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A unit of work posted to a [`TaskQueue`](crate::TaskQueue).
///
/// Runs at most once. Not required to be `Clone`.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The repeating task of a [`PeriodicTimer`](crate::PeriodicTimer).
pub type TimerTask = Box<dyn FnMut() + Send + 'static>;

/// Callback receiving failures raised on a worker thread.
///
/// Runs on the worker that observed the failure. A slow handler delays
/// every task queued behind the failing one.
pub type ExceptionHandler = Arc<dyn Fn(Error) + Send + Sync + 'static>;

/// Runs `f`, turning a panic into an [`Error`] attributed to `name`.
pub(crate) fn run_guarded<F>(name: &str, f: F) -> Result<(), Error>
where
    F: FnOnce(),
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Error::from_task_panic(name, payload))
}

/// Forwards `error` to `handler`, or drops it when no handler is set.
///
/// A panicking handler is logged and otherwise ignored so that it can
/// never take the worker down with it.
pub(crate) fn report(handler: Option<&ExceptionHandler>, error: Error) {
    let Some(handler) = handler else {
        tracing::trace!(%error, "failure dropped, no exception handler installed");
        return;
    };

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(error))) {
        let message = crate::error::panic_message(payload.as_ref())
            .unwrap_or_else(|| String::from("unknown failure"));
        tracing::error!(%message, "exception handler panicked");
    }
}

/// Returns a handler that logs every failure at `error` level.
///
/// Useful while debugging, or as a default for queues whose failures
/// should not go unnoticed.
pub fn debug_exception_handler() -> ExceptionHandler {
    Arc::new(|error: Error| {
        tracing::error!(origin = error.origin().unwrap_or("-"), kind = ?error.kind(), %error, "task failure");
    })
}

/// Cooperative cancellation signal for a single start cycle.
///
/// Each `start` creates a fresh token shared between the controller and
/// the run loop. The token is only ever set, never reset.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
