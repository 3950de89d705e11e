use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state shared by every schedulable component.
///
/// A component starts out [`Free`](AsyncState::Free), becomes
/// [`Busy`](AsyncState::Busy) while its run loop is installed, passes
/// through [`Stopping`](AsyncState::Stopping) once cancellation has been
/// requested, and settles in [`Stopped`](AsyncState::Stopped) when the loop
/// has exited. `Stopped` components may be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AsyncState {
    /// Never started.
    #[default]
    Free = 0,

    /// The run loop is installed and processing work.
    Busy = 1,

    /// Cancellation was requested; the run loop has not exited yet.
    Stopping = 2,

    /// The run loop has exited.
    Stopped = 3,
}

impl AsyncState {
    /// Returns `true` when a `start` call would install a new run loop.
    pub fn is_startable(self) -> bool {
        matches!(self, AsyncState::Free | AsyncState::Stopped)
    }

    /// Returns `true` while a run loop is installed, including while it winds down.
    pub fn is_running(self) -> bool {
        matches!(self, AsyncState::Busy | AsyncState::Stopping)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => AsyncState::Free,
            1 => AsyncState::Busy,
            2 => AsyncState::Stopping,
            _ => AsyncState::Stopped,
        }
    }
}

impl fmt::Display for AsyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AsyncState::Free => "free",
            AsyncState::Busy => "busy",
            AsyncState::Stopping => "stopping",
            AsyncState::Stopped => "stopped",
        };

        f.write_str(label)
    }
}

/// Lock-free cell holding an [`AsyncState`].
///
/// Readable from any thread. Writers are the owning component's control
/// methods and its run loop.
#[derive(Debug, Default)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new(state: AsyncState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> AsyncState {
        AsyncState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: AsyncState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves to `to` only if the current state is `from`.
    ///
    /// On failure the state actually observed is returned.
    pub(crate) fn transition(&self, from: AsyncState, to: AsyncState) -> Result<(), AsyncState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(AsyncState::from_u8)
    }
}

/// The start/stop contract shared by [`TaskQueue`](crate::TaskQueue) and
/// [`PeriodicTimer`](crate::PeriodicTimer).
///
/// Control calls never fail: calls that do not fit the current state are
/// ignored and logged.
pub trait AsyncControl {
    /// Installs the run loop if the component is `Free` or `Stopped`.
    fn start(&self);

    /// Requests cancellation if the component is `Busy`.
    fn stop(&self);

    /// Current lifecycle state.
    fn state(&self) -> AsyncState;

    /// Name used for logging and OS-level thread naming.
    fn name(&self) -> &str;
}
