// ============================================================
// Layer 6 — Stdout Silencer
// ============================================================
// Scoped redirection of file descriptor 1 to /dev/null. The
// guard restores the original descriptor when dropped, which
// also happens while unwinding, so a failure inside the
// silenced region cannot leave the process without stdout.
//
// Guards may overlap (several threads training at once). A
// process-wide depth count makes the first guard redirect and
// the last one dropped restore, whatever order they go in.
//
// Only the training step acquires it, around gradient
// construction; log output goes to stderr and is unaffected.

use anyhow::Result;

#[cfg(unix)]
mod imp {
    use anyhow::{Context, Result};
    use std::fs::OpenOptions;
    use std::io::{self, Write};
    use std::os::unix::io::{AsRawFd, RawFd};
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use tracing::{trace, warn};

    /// Process-wide redirection state. Only the outermost guard
    /// redirects fd 1 and only the last one dropped restores it.
    struct Redirect {
        depth:    usize,
        saved_fd: RawFd,
    }

    static REDIRECT: Mutex<Redirect> = Mutex::new(Redirect { depth: 0, saved_fd: -1 });

    fn state() -> MutexGuard<'static, Redirect> {
        REDIRECT.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[derive(Debug)]
    pub struct StdoutSilencer {
        _private: (),
    }

    impl StdoutSilencer {
        pub fn acquire() -> Result<Self> {
            let mut redirect = state();
            if redirect.depth == 0 {
                io::stdout().flush().context("Failed to flush stdout before silencing")?;

                let null = OpenOptions::new()
                    .write(true)
                    .open("/dev/null")
                    .context("Failed to open /dev/null")?;

                let saved_fd = unsafe { libc::dup(libc::STDOUT_FILENO) };
                if saved_fd == -1 {
                    return Err(io::Error::last_os_error()).context("Failed to duplicate stdout (dup)");
                }
                if unsafe { libc::dup2(null.as_raw_fd(), libc::STDOUT_FILENO) } == -1 {
                    let err = io::Error::last_os_error();
                    unsafe { libc::close(saved_fd) };
                    return Err(err).context("Failed to redirect stdout to /dev/null (dup2)");
                }
                redirect.saved_fd = saved_fd;
                trace!("stdout silenced (saved as fd {})", saved_fd);
            }
            redirect.depth += 1;
            Ok(Self { _private: () })
        }
    }

    impl Drop for StdoutSilencer {
        fn drop(&mut self) {
            let mut redirect = state();
            redirect.depth -= 1;
            if redirect.depth > 0 {
                return;
            }
            let _ = io::stdout().flush();
            if unsafe { libc::dup2(redirect.saved_fd, libc::STDOUT_FILENO) } == -1 {
                warn!("Failed to restore stdout: {}", io::Error::last_os_error());
            }
            unsafe { libc::close(redirect.saved_fd) };
            redirect.saved_fd = -1;
            trace!("stdout restored");
        }
    }

    /// (device, inode) of fd 1, read once no guard is held anywhere
    /// in the process.
    #[cfg(test)]
    pub(super) fn idle_stdout_identity() -> (u64, u64) {
        loop {
            let redirect = state();
            if redirect.depth == 0 {
                let mut stat: libc::stat = unsafe { std::mem::zeroed() };
                let rc = unsafe { libc::fstat(libc::STDOUT_FILENO, &mut stat) };
                assert_eq!(rc, 0, "fstat(1) failed");
                return (stat.st_dev as u64, stat.st_ino as u64);
            }
            drop(redirect);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use anyhow::Result;

    #[derive(Debug)]
    pub struct StdoutSilencer;

    impl StdoutSilencer {
        pub fn acquire() -> Result<Self> {
            Ok(Self)
        }
    }
}

pub use imp::StdoutSilencer;

/// Run `f` with stdout discarded.
pub fn silenced<T>(f: impl FnOnce() -> T) -> Result<T> {
    let _guard = StdoutSilencer::acquire()?;
    Ok(f())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(all(test, unix))]
mod tests {
    use super::imp::idle_stdout_identity;
    use super::*;

    #[test]
    fn test_returns_closure_value() {
        let before = idle_stdout_identity();
        let value = silenced(|| {
            println!("this line goes nowhere");
            42
        })
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(idle_stdout_identity(), before);
    }

    #[test]
    fn test_restored_after_panic() {
        let before = idle_stdout_identity();
        let result = std::panic::catch_unwind(|| {
            let _guard = StdoutSilencer::acquire().unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(idle_stdout_identity(), before);
    }

    #[test]
    fn test_overlapping_guards_restore_original_stdout() {
        let before = idle_stdout_identity();

        let outer = StdoutSilencer::acquire().unwrap();
        let inner = StdoutSilencer::acquire().unwrap();
        // released in acquisition order, not nesting order
        drop(outer);
        drop(inner);

        assert_eq!(idle_stdout_identity(), before);
    }

    #[test]
    fn test_guards_from_many_threads() {
        let before = idle_stdout_identity();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                std::thread::spawn(move || {
                    silenced(|| std::thread::sleep(std::time::Duration::from_millis(i % 3))).unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(idle_stdout_identity(), before);
    }
}
