//! Thread helpers.
//!
//! Worker threads carry the name of the queue or timer they serve, both
//! as the Rust thread name and, best effort, as the OS-level name shown
//! by debuggers and profilers.

use crate::error::{Error, Result};
use crate::task::{Task, run_guarded};

use std::io;
use std::thread::{self, JoinHandle};

/// Longest name (in bytes, without the terminator) Linux accepts.
#[cfg(target_os = "linux")]
const OS_NAME_MAX: usize = 15;

/// Sets the OS-level name of the calling thread.
///
/// Failures are ignored: naming is purely diagnostic. Names are cut to
/// the platform limit on a character boundary, and names containing a
/// NUL byte are skipped.
pub fn set_current_thread_name(name: &str) {
    if name.is_empty() {
        return;
    }

    os::set_current_thread_name(name);
}

/// Spawns a thread, named unless `name` is empty, mapping OS failures
/// to [`Error::Spawn`].
pub(crate) fn spawn_named<F>(name: &str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let mut builder = thread::Builder::new();
    if !name.is_empty() {
        builder = builder.name(name.to_owned());
    }

    builder
        .spawn(f)
        .map_err(|source: io::Error| Error::Spawn {
            name: name.to_owned(),
            source,
        })
}

/// Joins `handle`, unless it is the calling thread's own handle.
pub(crate) fn join_unless_current(handle: JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        return;
    }

    let _ = handle.join();
}

/// Runs `task` once on a fresh, detached thread.
///
/// A panic inside the task is caught and logged.
///
/// # Errors
///
/// Returns [`Error::Spawn`] if the thread cannot be created.
pub fn async_call(task: Task) -> Result<()> {
    const NAME: &str = "darkness-async-call";

    spawn_named(NAME, move || {
        if let Err(error) = run_guarded(NAME, task) {
            tracing::error!(%error, "detached call failed");
        }
    })
    .map(drop)
}

/// Truncates `name` to at most `max` bytes without splitting a character.
#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn truncate_on_char_boundary(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }

    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }

    &name[..end]
}

#[cfg(target_os = "linux")]
mod os {
    use super::{OS_NAME_MAX, truncate_on_char_boundary};

    use std::ffi::CString;

    pub(super) fn set_current_thread_name(name: &str) {
        let Ok(name) = CString::new(truncate_on_char_boundary(name, OS_NAME_MAX)) else {
            return;
        };

        // Safety: `pthread_self` is always valid for the calling thread and
        // `name` is a NUL-terminated string within the 16-byte limit.
        let rc = unsafe { libc::pthread_setname_np(libc::pthread_self(), name.as_ptr()) };
        if rc != 0 {
            tracing::trace!(rc, "pthread_setname_np failed");
        }
    }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod os {
    use std::ffi::CString;

    pub(super) fn set_current_thread_name(name: &str) {
        let Ok(name) = CString::new(name) else {
            return;
        };

        // Safety: `name` is a valid NUL-terminated string; Apple's variant
        // only names the calling thread.
        let rc = unsafe { libc::pthread_setname_np(name.as_ptr()) };
        if rc != 0 {
            tracing::trace!(rc, "pthread_setname_np failed");
        }
    }
}

#[cfg(windows)]
mod os {
    use windows_sys::Win32::System::Threading::{GetCurrentThread, SetThreadDescription};

    pub(super) fn set_current_thread_name(name: &str) {
        if name.contains('\0') {
            return;
        }

        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();

        // Safety: `GetCurrentThread` returns a pseudo handle valid for the
        // calling thread and `wide` is NUL-terminated UTF-16.
        let hr = unsafe { SetThreadDescription(GetCurrentThread(), wide.as_ptr()) };
        if hr < 0 {
            tracing::trace!(hr, "SetThreadDescription failed");
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios", windows)))]
mod os {
    pub(super) fn set_current_thread_name(_name: &str) {}
}
