use super::core::Shared;
use crate::error::Error;
use crate::state::AsyncState;
use crate::task::{self, CancelToken, Task};
use crate::thread::set_current_thread_name;

use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// Runs the queue's dequeue loop on the current thread until `token` is
/// cancelled.
///
/// Each iteration waits for either a task or cancellation, then runs
/// exactly one task outside of every lock. A panicking task is reported
/// and the loop moves on to the next one.
pub(crate) fn run(shared: &Shared, token: CancelToken) {
    let _exit = ExitGuard { shared };

    *shared.worker_id.lock() = Some(thread::current().id());
    set_current_thread_name(&shared.name);

    tracing::debug!(queue = %shared.name, "run loop entered");

    while !token.is_cancelled() {
        let next = panic::catch_unwind(AssertUnwindSafe(|| next_task(shared, &token)));

        let task = match next {
            Ok(Some(task)) => task,
            Ok(None) => break,
            Err(payload) => {
                task::report(shared.handler.as_ref(), Error::from_loop_panic(&shared.name, payload));
                continue;
            }
        };

        if let Err(error) = task::run_guarded(&shared.name, task) {
            task::report(shared.handler.as_ref(), error);
        }
    }
}

/// Blocks until a task is available or the cycle is cancelled.
///
/// Returns `None` on cancellation. Spurious wakeups re-enter the wait.
fn next_task(shared: &Shared, token: &CancelToken) -> Option<Task> {
    let mut pending = shared.pending.lock();

    loop {
        if token.is_cancelled() {
            return None;
        }

        if let Some(task) = pending.pop_front() {
            return Some(task);
        }

        shared.condvar.wait(&mut pending);
    }
}

/// Publishes "no worker" and `Stopped` when the loop exits, however it exits.
struct ExitGuard<'a> {
    shared: &'a Shared,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        // Identity first: a new cycle may begin as soon as `Stopped` is visible.
        *self.shared.worker_id.lock() = None;
        self.shared.state.store(AsyncState::Stopped);

        tracing::debug!(queue = %self.shared.name, "run loop exited");
    }
}
