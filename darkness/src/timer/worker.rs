use super::core::Shared;
use super::{Delay, FailurePolicy};
use crate::error::Error;
use crate::state::AsyncState;
use crate::task::{self, CancelToken};
use crate::thread::set_current_thread_name;

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

/// Wait used after a delay provider failure when no delay has been
/// computed successfully yet.
pub const FALLBACK_DELAY: Duration = Duration::from_millis(100);

/// Timer loop: compute delay, wait, tick; until `token` is cancelled.
pub(crate) fn run(shared: &Shared, token: CancelToken) {
    let _exit = ExitGuard { shared };

    *shared.worker_id.lock() = Some(thread::current().id());
    set_current_thread_name(&shared.name);

    tracing::debug!(timer = %shared.name, "timer loop entered");

    let mut last_delay = None;

    while !token.is_cancelled() {
        let (delay, tick) = match next_delay(shared) {
            Ok(delay) => {
                last_delay = Some(delay);
                (delay, true)
            }
            Err(error) => {
                task::report(shared.handler.as_ref(), error);
                if shared.policy == FailurePolicy::Stop {
                    break;
                }

                // Skip this tick.
                (last_delay.unwrap_or(FALLBACK_DELAY), false)
            }
        };

        if !wait(shared, &token, delay) {
            break;
        }

        if !tick {
            continue;
        }

        if let Err(error) = run_task(shared) {
            task::report(shared.handler.as_ref(), error);
            if shared.policy == FailurePolicy::Stop {
                break;
            }
        }
    }
}

fn next_delay(shared: &Shared) -> Result<Duration, Error> {
    match &shared.delay {
        Delay::Fixed(delay) => Ok(*delay),
        Delay::Provider(provider) => panic::catch_unwind(AssertUnwindSafe(|| provider()))
            .map_err(|payload| Error::from_delay_panic(&shared.name, payload)),
    }
}

/// Sleeps for `delay` unless cancelled first.
///
/// Returns `false` on cancellation. Spurious wakeups resume the wait
/// against the same deadline.
fn wait(shared: &Shared, token: &CancelToken, delay: Duration) -> bool {
    // `None` when the deadline is beyond what `Instant` can represent.
    let deadline = Instant::now().checked_add(delay);

    let mut gate = shared.gate.lock();

    loop {
        if token.is_cancelled() {
            return false;
        }

        match deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return true;
                }
                shared.condvar.wait_until(&mut gate, deadline);
            }
            None => shared.condvar.wait(&mut gate),
        }
    }
}

fn run_task(shared: &Shared) -> Result<(), Error> {
    let mut slot = shared.task.lock();

    match slot.as_mut() {
        Some(f) => task::run_guarded(&shared.name, f),
        None => Ok(()),
    }
}

struct ExitGuard<'a> {
    shared: &'a Shared,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        *self.shared.worker_id.lock() = None;

        let _gate = self.shared.gate.lock();
        self.shared.state.store(AsyncState::Stopped);
        self.shared.condvar.notify_all();

        tracing::debug!(timer = %self.shared.name, "timer loop exited");
    }
}
