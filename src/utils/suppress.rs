// file: src/utils/suppress.rs
// description: scoped redirection of process stdout/stderr to the null device
// reference: https://man7.org/linux/man-pages/man2/dup.2.html

use crate::error::Result;
use std::io::Write;
use std::sync::Mutex;

#[cfg(unix)]
struct SavedStreams {
    stdout: libc::c_int,
    stderr: libc::c_int,
    _null: std::fs::File,
}

struct SuppressState {
    depth: usize,
    #[cfg(unix)]
    saved: Option<SavedStreams>,
}

static STATE: Mutex<SuppressState> = Mutex::new(SuppressState {
    depth: 0,
    #[cfg(unix)]
    saved: None,
});

/// Silences fds 1 and 2 for the lifetime of the guard, native writers included.
///
/// Guards nest: only the outermost one redirects and only its drop restores.
/// On non-unix targets the guard tracks depth and does nothing else.
#[must_use = "streams are restored as soon as the guard is dropped"]
pub struct StreamSuppressor {
    _private: (),
}

impl StreamSuppressor {
    pub fn new() -> Result<Self> {
        let mut state = STATE.lock().unwrap_or_else(|e| e.into_inner());
        if state.depth == 0 {
            flush_std();
            #[cfg(unix)]
            {
                state.saved = Some(redirect_to_null()?);
            }
        }
        state.depth += 1;
        Ok(Self { _private: () })
    }

    /// Current nesting depth, zero when nothing is suppressed.
    pub fn depth() -> usize {
        STATE.lock().unwrap_or_else(|e| e.into_inner()).depth
    }
}

impl Drop for StreamSuppressor {
    fn drop(&mut self) {
        let mut state = STATE.lock().unwrap_or_else(|e| e.into_inner());
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            flush_std();
            #[cfg(unix)]
            if let Some(saved) = state.saved.take() {
                restore(saved);
            }
        }
    }
}

/// Runs `f` with stdout/stderr silenced unless `verbose` is set.
pub fn quietly<T>(verbose: bool, f: impl FnOnce() -> T) -> Result<T> {
    if verbose {
        return Ok(f());
    }
    let _guard = StreamSuppressor::new()?;
    Ok(f())
}

fn flush_std() {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}

#[cfg(unix)]
fn redirect_to_null() -> Result<SavedStreams> {
    use std::os::fd::AsRawFd;

    let null = std::fs::OpenOptions::new().write(true).open("/dev/null")?;
    let null_fd = null.as_raw_fd();

    // SAFETY: dup/dup2/close only operate on descriptors owned by this process;
    // every returned value is checked before use.
    unsafe {
        let stdout = libc::dup(libc::STDOUT_FILENO);
        if stdout < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        let stderr = libc::dup(libc::STDERR_FILENO);
        if stderr < 0 {
            let err = std::io::Error::last_os_error();
            libc::close(stdout);
            return Err(err.into());
        }
        if libc::dup2(null_fd, libc::STDOUT_FILENO) < 0 || libc::dup2(null_fd, libc::STDERR_FILENO) < 0 {
            let err = std::io::Error::last_os_error();
            libc::dup2(stdout, libc::STDOUT_FILENO);
            libc::dup2(stderr, libc::STDERR_FILENO);
            libc::close(stdout);
            libc::close(stderr);
            return Err(err.into());
        }
        Ok(SavedStreams {
            stdout,
            stderr,
            _null: null,
        })
    }
}

#[cfg(unix)]
fn restore(saved: SavedStreams) {
    // SAFETY: the saved descriptors were produced by dup in redirect_to_null
    // and are closed exactly once here.
    unsafe {
        libc::dup2(saved.stdout, libc::STDOUT_FILENO);
        libc::dup2(saved.stderr, libc::STDERR_FILENO);
        libc::close(saved.stdout);
        libc::close(saved.stderr);
    }
}
