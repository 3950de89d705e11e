use super::ExecutionStrategy;
use super::worker;
use crate::error::{Error, Result};
use crate::state::{AsyncControl, AsyncState, AtomicState};
use crate::task::{self, CancelToken, ExceptionHandler, Task};
use crate::thread::{join_unless_current, spawn_named};

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// State shared between a queue handle and its run loop.
///
/// `pending` and `worker_id` are only touched under their own locks, and
/// neither lock is ever held while a task runs.
pub(crate) struct Shared {
    /// Queue name, also used as the worker thread name.
    pub(crate) name: String,

    /// Receives task and loop failures.
    pub(crate) handler: Option<ExceptionHandler>,

    /// Lifecycle state, readable from any thread.
    pub(crate) state: AtomicState,

    /// Thread currently hosting the run loop.
    pub(crate) worker_id: Mutex<Option<ThreadId>>,

    /// Tasks waiting to run, in post order.
    pub(crate) pending: Mutex<VecDeque<Task>>,

    /// Signalled on post (one waiter) and on stop (all waiters).
    pub(crate) condvar: Condvar,
}

/// Controller-side bookkeeping for the current start cycle.
#[derive(Default)]
struct Control {
    /// Cancellation signal of the running cycle.
    token: Option<CancelToken>,

    /// Worker thread of a dedicated-thread queue.
    worker: Option<JoinHandle<()>>,
}

/// A named FIFO task queue.
///
/// Tasks posted to one queue run one at a time, in the order they were
/// posted, on the thread hosting the queue's run loop. Where that loop
/// lives is decided by the queue's [`ExecutionStrategy`].
///
/// `post` is valid in every state: tasks posted before the first `start`,
/// or after a `stop`, wait for the next start cycle. `stop` discards the
/// tasks that have not been dequeued yet.
///
/// Dropping the last handle stops the queue.
///
/// # Examples
///
/// ```rust
/// use darkness::QueueBuilder;
/// use std::sync::mpsc;
///
/// let queue = QueueBuilder::new("io").build().unwrap();
/// let (tx, rx) = mpsc::channel();
///
/// queue.post(move || tx.send(1 + 1).unwrap());
/// queue.start();
///
/// assert_eq!(rx.recv().unwrap(), 2);
/// queue.stop();
/// ```
pub struct TaskQueue {
    shared: Arc<Shared>,
    strategy: ExecutionStrategy,
    control: Mutex<Control>,
}

impl TaskQueue {
    /// Creates a stopped queue.
    ///
    /// Creation never starts the queue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyName`] if `name` is empty.
    pub fn new(
        name: impl Into<String>,
        handler: Option<ExceptionHandler>,
        strategy: ExecutionStrategy,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        Ok(Self::from_parts(name, handler, strategy))
    }

    /// Creates a queue from a name already known to be non-empty.
    pub(crate) fn from_parts(
        name: impl Into<String>,
        handler: Option<ExceptionHandler>,
        strategy: ExecutionStrategy,
    ) -> Self {
        let shared = Shared {
            name: name.into(),
            handler,
            state: AtomicState::new(AsyncState::Free),
            worker_id: Mutex::new(None),
            pending: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
        };

        Self {
            shared: Arc::new(shared),
            strategy,
            control: Mutex::new(Control::default()),
        }
    }

    /// Installs the run loop if the queue is `Free` or `Stopped`.
    ///
    /// The queue is `Busy` as soon as the loop is installed. Calls made
    /// while `Busy` or `Stopping` are ignored.
    ///
    /// For [`ExecutionStrategy::DedicatedThread`] a worker thread is
    /// spawned and this returns immediately. For
    /// [`ExecutionStrategy::CallerDriven`] the calling thread becomes the
    /// worker and this returns only after the queue has been stopped.
    ///
    /// If the worker thread cannot be spawned, the failure goes to the
    /// exception handler and the queue ends up `Stopped`.
    pub fn start(&self) {
        let mut control = self.control.lock();

        let state = self.shared.state.load();
        if !state.is_startable() {
            tracing::warn!(queue = %self.shared.name, %state, "start ignored");
            return;
        }

        let token = CancelToken::new();
        control.token = Some(token.clone());
        self.shared.state.store(AsyncState::Busy);

        tracing::debug!(queue = %self.shared.name, strategy = %self.strategy, "starting");

        match self.strategy {
            ExecutionStrategy::DedicatedThread => {
                // The previous worker already published `Stopped`, so it is
                // on its way out.
                if let Some(previous) = control.worker.take() {
                    join_unless_current(previous);
                }

                let shared = Arc::clone(&self.shared);
                match spawn_named(&self.shared.name, move || worker::run(&shared, token)) {
                    Ok(handle) => control.worker = Some(handle),
                    Err(error) => {
                        control.token = None;
                        self.shared.state.store(AsyncState::Stopped);

                        tracing::error!(queue = %self.shared.name, %error, "worker spawn failed");
                        task::report(self.shared.handler.as_ref(), error);
                    }
                }
            }

            ExecutionStrategy::CallerDriven => {
                drop(control);
                worker::run(&self.shared, token);
            }
        }
    }

    /// Requests cancellation of a `Busy` queue.
    ///
    /// Pending tasks are discarded without running and without being
    /// reported. The task currently executing, if any, runs to completion;
    /// the queue reaches `Stopped` once the loop notices the request.
    /// This never waits for the loop to exit.
    ///
    /// May be called from inside a task of this queue. Calls on a queue
    /// that is not `Busy` are ignored.
    pub fn stop(&self) {
        let control = self.control.lock();

        if let Err(state) = self.shared.state.transition(AsyncState::Busy, AsyncState::Stopping) {
            tracing::debug!(queue = %self.shared.name, %state, "stop has no effect");
            return;
        }

        if self.is_worker_thread() {
            tracing::debug!(
                queue = %self.shared.name,
                "stop requested from the queue's own worker, loop exits after the current task"
            );
        } else {
            tracing::debug!(queue = %self.shared.name, "stop requested");
        }

        let discarded = {
            let mut pending = self.shared.pending.lock();

            if let Some(token) = &control.token {
                token.cancel();
            }

            self.shared.condvar.notify_all();
            mem::take(&mut *pending)
        };

        drop(control);

        // Discarded closures may own queue handles; drop them lock-free.
        drop(discarded);
    }

    /// Appends `task` to the queue and wakes the worker.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_boxed(Box::new(task));
    }

    /// Appends an already boxed task.
    pub fn post_boxed(&self, task: Task) {
        let mut pending = self.shared.pending.lock();
        pending.push_back(task);
        self.shared.condvar.notify_one();
    }

    pub fn state(&self) -> AsyncState {
        self.shared.state.load()
    }

    /// Thread currently hosting the run loop, or `None` when not running.
    pub fn worker_thread_id(&self) -> Option<ThreadId> {
        *self.shared.worker_id.lock()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Number of tasks waiting to be dequeued.
    pub fn pending_len(&self) -> usize {
        self.shared.pending.lock().len()
    }

    fn is_worker_thread(&self) -> bool {
        self.worker_thread_id() == Some(thread::current().id())
    }
}

impl AsyncControl for TaskQueue {
    fn start(&self) {
        TaskQueue::start(self);
    }

    fn stop(&self) {
        TaskQueue::stop(self);
    }

    fn state(&self) -> AsyncState {
        TaskQueue::state(self)
    }

    fn name(&self) -> &str {
        TaskQueue::name(self)
    }
}

impl Drop for TaskQueue {
    /// Stops the queue and, for a dedicated-thread queue, waits for the
    /// worker to exit unless the drop runs on that worker.
    fn drop(&mut self) {
        self.stop();

        if let Some(handle) = self.control.get_mut().worker.take() {
            join_unless_current(handle);
        }
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.shared.name)
            .field("strategy", &self.strategy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
