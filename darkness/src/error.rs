//! Error types.
//!
//! Failures inside tasks never reach the caller of `post`, `start` or
//! `stop`. They are captured on the worker thread, converted into an
//! [`Error`] and handed to the owning component's exception handler.
//! Construction-time usage errors are returned directly.

use std::any::Any;
use std::io;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by queues, timers and the registry.
#[derive(Debug, Error)]
pub enum Error {
    #[error("task on `{name}` panicked: {message}")]
    TaskPanicked { name: String, message: String },

    #[error("delay provider of `{name}` panicked: {message}")]
    DelayPanicked { name: String, message: String },

    #[error("unknown failure on `{name}`")]
    Unknown { name: String },

    #[error("queue name must not be empty")]
    EmptyName,

    #[error("timer requires a fixed delay or a delay provider")]
    MissingDelay,

    #[error("failed to spawn worker thread `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A posted task or timer task failed.
    Task,

    /// A timer's delay provider failed.
    Delay,

    /// A failure carrying no further information.
    Unknown,

    /// The API was used incorrectly.
    Usage,

    /// The operating system refused to create a thread.
    Spawn,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TaskPanicked { .. } => ErrorKind::Task,
            Error::DelayPanicked { .. } => ErrorKind::Delay,
            Error::Unknown { .. } => ErrorKind::Unknown,
            Error::EmptyName | Error::MissingDelay => ErrorKind::Usage,
            Error::Spawn { .. } => ErrorKind::Spawn,
        }
    }

    /// Name of the queue or timer the failure belongs to, if any.
    pub fn origin(&self) -> Option<&str> {
        match self {
            Error::TaskPanicked { name, .. }
            | Error::DelayPanicked { name, .. }
            | Error::Unknown { name }
            | Error::Spawn { name, .. } => Some(name),
            Error::EmptyName | Error::MissingDelay => None,
        }
    }

    /// Builds a task failure from a captured panic payload.
    ///
    /// Payloads that are not strings become [`Error::Unknown`].
    pub(crate) fn from_task_panic(name: &str, payload: Box<dyn Any + Send>) -> Self {
        match panic_message(payload.as_ref()) {
            Some(message) => Error::TaskPanicked {
                name: name.to_owned(),
                message,
            },
            None => Error::Unknown {
                name: name.to_owned(),
            },
        }
    }

    /// Builds a failure of the run loop itself, outside of any task.
    ///
    /// The payload is only logged; handlers receive [`Error::Unknown`].
    pub(crate) fn from_loop_panic(name: &str, payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref()).unwrap_or_default();
        tracing::error!(origin = name, %message, "run loop panicked");

        Error::Unknown {
            name: name.to_owned(),
        }
    }

    /// Builds a delay-provider failure from a captured panic payload.
    pub(crate) fn from_delay_panic(name: &str, payload: Box<dyn Any + Send>) -> Self {
        match panic_message(payload.as_ref()) {
            Some(message) => Error::DelayPanicked {
                name: name.to_owned(),
                message,
            },
            None => Error::Unknown {
                name: name.to_owned(),
            },
        }
    }
}

/// Extracts the message of a `panic!` payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return Some((*message).to_owned());
    }

    payload.downcast_ref::<String>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_payload_becomes_task_error() {
        let err = Error::from_task_panic("worker", Box::new(String::from("boom")));

        assert_eq!(err.kind(), ErrorKind::Task);
        assert_eq!(err.origin(), Some("worker"));
        assert_eq!(err.to_string(), "task on `worker` panicked: boom");
    }

    #[test]
    fn test_static_str_payload() {
        let err = Error::from_delay_panic("tick", Box::new("bad delay"));

        assert_eq!(err.kind(), ErrorKind::Delay);
        assert_eq!(err.to_string(), "delay provider of `tick` panicked: bad delay");
    }

    #[test]
    fn test_opaque_payload_is_unknown() {
        let err = Error::from_task_panic("worker", Box::new(42_u32));

        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.to_string(), "unknown failure on `worker`");
    }

    #[test]
    fn test_loop_failure_is_not_a_task_failure() {
        let err = Error::from_loop_panic("worker", Box::new("lock poisoned"));

        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.origin(), Some("worker"));
        assert_eq!(err.to_string(), "unknown failure on `worker`");
    }

    #[test]
    fn test_usage_errors_have_no_origin() {
        assert_eq!(Error::EmptyName.kind(), ErrorKind::Usage);
        assert_eq!(Error::MissingDelay.origin(), None);
    }
}
