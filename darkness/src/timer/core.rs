use super::worker;
use super::{Delay, FailurePolicy};
use crate::state::{AsyncControl, AsyncState, AtomicState};
use crate::task::{self, CancelToken, ExceptionHandler, TimerTask};
use crate::thread::{join_unless_current, spawn_named};

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// State shared between a timer handle and its worker.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) delay: Delay,
    pub(crate) policy: FailurePolicy,
    pub(crate) handler: Option<ExceptionHandler>,

    /// Only ever locked by the worker.
    pub(crate) task: Mutex<Option<TimerTask>>,

    pub(crate) state: AtomicState,
    pub(crate) worker_id: Mutex<Option<ThreadId>>,

    /// Guards cancellation of the current cycle against the worker's wait,
    /// and the worker's exit against callers of `stop`.
    pub(crate) gate: Mutex<()>,
    pub(crate) condvar: Condvar,
}

#[derive(Default)]
struct Control {
    token: Option<CancelToken>,
    worker: Option<JoinHandle<()>>,
}

/// Runs a task repeatedly on a dedicated thread.
///
/// Before every tick the timer computes its delay (fixed, or freshly
/// obtained from a provider), waits for it unless cancelled, and then runs
/// the task once. Failures are reported to the exception handler and then
/// handled according to the timer's [`FailurePolicy`].
///
/// Unlike [`TaskQueue::stop`](crate::TaskQueue::stop), [`stop`](Self::stop)
/// blocks until the worker has exited: once it returns the task will not
/// run again.
///
/// Dropping the timer stops it.
pub struct PeriodicTimer {
    shared: Arc<Shared>,
    control: Mutex<Control>,
}

impl PeriodicTimer {
    /// Creates a timer with a fixed delay.
    pub fn new<F>(delay: Duration, task: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::from_parts(
            String::new(),
            Delay::Fixed(delay),
            Some(Box::new(task)),
            None,
            FailurePolicy::default(),
        )
    }

    pub(crate) fn from_parts(
        name: String,
        delay: Delay,
        task: Option<TimerTask>,
        handler: Option<ExceptionHandler>,
        policy: FailurePolicy,
    ) -> Self {
        let shared = Shared {
            name,
            delay,
            policy,
            handler,
            task: Mutex::new(task),
            state: AtomicState::new(AsyncState::Free),
            worker_id: Mutex::new(None),
            gate: Mutex::new(()),
            condvar: Condvar::new(),
        };

        Self {
            shared: Arc::new(shared),
            control: Mutex::new(Control::default()),
        }
    }

    /// Spawns the worker if the timer is `Free` or `Stopped`.
    ///
    /// Returns immediately. Calls made while `Busy` or `Stopping` are
    /// ignored.
    pub fn start(&self) {
        let mut control = self.control.lock();

        let state = self.shared.state.load();
        if !state.is_startable() {
            tracing::warn!(timer = %self.shared.name, %state, "start ignored");
            return;
        }

        // Left behind by a worker that stopped itself.
        if let Some(previous) = control.worker.take() {
            join_unless_current(previous);
        }

        let token = CancelToken::new();
        control.token = Some(token.clone());
        self.shared.state.store(AsyncState::Busy);

        tracing::debug!(timer = %self.shared.name, "starting");

        let shared = Arc::clone(&self.shared);
        match spawn_named(&self.shared.name, move || worker::run(&shared, token)) {
            Ok(handle) => control.worker = Some(handle),
            Err(error) => {
                control.token = None;
                self.shared.state.store(AsyncState::Stopped);

                tracing::error!(timer = %self.shared.name, %error, "worker spawn failed");
                task::report(self.shared.handler.as_ref(), error);
            }
        }
    }

    /// Stops the timer and waits for its worker to exit.
    ///
    /// Calling this from the timer's own task cannot wait for the worker
    /// without deadlocking: the call is logged, cancellation is requested,
    /// and it returns at once. The worker exits after the current tick.
    pub fn stop(&self) {
        let mut control = self.control.lock();

        match self.shared.state.transition(AsyncState::Busy, AsyncState::Stopping) {
            Ok(()) => {
                let _gate = self.shared.gate.lock();
                if let Some(token) = &control.token {
                    token.cancel();
                }
                self.shared.condvar.notify_all();
            }
            Err(state) => {
                tracing::debug!(timer = %self.shared.name, %state, "stop has no effect");
            }
        }

        if self.is_worker_thread() {
            tracing::warn!(
                timer = %self.shared.name,
                "stop called from the timer's own task, not waiting for the worker"
            );
            return;
        }

        let worker = control.worker.take();
        drop(control);

        // The worker may call into this timer; never join under the lock.
        if let Some(handle) = worker {
            join_unless_current(handle);
            tracing::debug!(timer = %self.shared.name, "worker joined");
        }

        // Another caller may own the handle; wait for the worker to exit anyway.
        self.wait_for_exit();
    }

    /// Blocks while a cancelled worker is still winding down.
    fn wait_for_exit(&self) {
        let mut gate = self.shared.gate.lock();

        while self.shared.state.load() == AsyncState::Stopping {
            self.shared.condvar.wait(&mut gate);
        }
    }

    pub fn state(&self) -> AsyncState {
        self.shared.state.load()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Thread running the timer, or `None` when not running.
    pub fn worker_thread_id(&self) -> Option<ThreadId> {
        *self.shared.worker_id.lock()
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.shared.policy
    }

    fn is_worker_thread(&self) -> bool {
        self.worker_thread_id() == Some(thread::current().id())
    }
}

impl AsyncControl for PeriodicTimer {
    fn start(&self) {
        PeriodicTimer::start(self);
    }

    fn stop(&self) {
        PeriodicTimer::stop(self);
    }

    fn state(&self) -> AsyncState {
        PeriodicTimer::state(self)
    }

    fn name(&self) -> &str {
        PeriodicTimer::name(self)
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PeriodicTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTimer")
            .field("name", &self.shared.name)
            .field("delay", &self.shared.delay)
            .field("policy", &self.shared.policy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
