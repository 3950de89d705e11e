use super::PeriodicTimer;
use crate::error::{Error, Result};
use crate::task::{ExceptionHandler, TimerTask};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Computes the delay before the next tick.
pub type DelayProvider = Arc<dyn Fn() -> Duration + Send + Sync + 'static>;

/// How long a [`PeriodicTimer`] waits between ticks.
#[derive(Clone)]
pub enum Delay {
    /// The same interval before every tick.
    Fixed(Duration),

    /// Re-evaluated before every wait, which allows adaptive or backoff
    /// schedules.
    Provider(DelayProvider),
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Delay::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// What a timer does after its task or delay provider fails.
///
/// The failure is reported to the exception handler in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FailurePolicy {
    /// Keep ticking.
    #[default]
    Continue,

    /// Exit the worker; the timer ends up `Stopped`.
    Stop,
}

/// Builder for configuring and creating a [`PeriodicTimer`].
///
/// A delay is mandatory; everything else is optional. Without a task the
/// timer just ticks.
///
/// # Examples
///
/// ```rust
/// use darkness::{FailurePolicy, TimerBuilder};
/// use std::time::Duration;
///
/// let timer = TimerBuilder::new()
///     .name("heartbeat")
///     .delay(Duration::from_millis(250))
///     .task(|| println!("tick"))
///     .failure_policy(FailurePolicy::Continue)
///     .build()
///     .unwrap();
///
/// assert_eq!(timer.name(), "heartbeat");
/// ```
#[derive(Default)]
pub struct TimerBuilder {
    delay: Option<Delay>,
    task: Option<TimerTask>,
    name: String,
    handler: Option<ExceptionHandler>,
    policy: FailurePolicy,
}

impl TimerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits `delay` before every tick. Replaces any delay provider.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(Delay::Fixed(delay));
        self
    }

    /// Asks `provider` for the delay before every tick. Replaces any
    /// fixed delay.
    pub fn delay_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Delay::Provider(Arc::new(provider)));
        self
    }

    /// Sets the delay from an optional [`Delay`]; `None` clears it.
    pub fn delay_from(mut self, delay: Option<Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn task<F>(mut self, task: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.task = Some(Box::new(task));
        self
    }

    /// Name of the timer and of its worker thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn exception_handler(mut self, handler: ExceptionHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn on_error<F>(self, f: F) -> Self
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        self.exception_handler(Arc::new(f))
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the timer. No thread is started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDelay`] if neither a fixed delay nor a
    /// delay provider was configured.
    pub fn build(self) -> Result<PeriodicTimer> {
        let delay = self.delay.ok_or(Error::MissingDelay)?;

        Ok(PeriodicTimer::from_parts(
            self.name,
            delay,
            self.task,
            self.handler,
            self.policy,
        ))
    }
}
