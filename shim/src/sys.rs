//! Low-level helpers that must never route back through an intercepted
//! entry point.

use std::cell::Cell;
use std::os::raw::{c_char, c_int};

use errno::{errno, set_errno, Errno};

//
// -------- Re-entrancy guard --------
//

thread_local! {
    static IN_SHIM: Cell<u32> = const { Cell::new(0) };
}

/// Marks the current thread as being inside the shim for the guard's
/// lifetime. Only the outermost guard on a thread is primary; nested calls
/// are forwarded without being observed.
#[derive(Debug)]
pub struct Guard {
    primary: bool,
}

impl Guard {
    pub fn enter() -> Guard {
        let primary = IN_SHIM.with(|cell| {
            let depth = cell.get();
            cell.set(depth.saturating_add(1));
            depth == 0
        });
        Guard { primary }
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        IN_SHIM.with(|cell| cell.set(cell.get().saturating_sub(1)));
    }
}

//
// -------- errno --------
//

/// Restores the errno captured at construction when dropped.
#[must_use]
pub struct SavedErrno(Errno);

impl SavedErrno {
    pub fn capture() -> SavedErrno {
        SavedErrno(errno())
    }
}

impl Drop for SavedErrno {
    fn drop(&mut self) {
        set_errno(self.0);
    }
}

//
// -------- Raw syscalls --------
//

/// `open(2)` straight through the kernel, bypassing libc and dlsym.
#[inline]
pub unsafe fn open_unhooked(path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    unsafe {
        libc::syscall(
            libc::SYS_openat,
            libc::AT_FDCWD as libc::c_long,
            path as libc::c_long,
            flags as libc::c_long,
            mode as libc::c_long,
        ) as c_int
    }
}

/// Best-effort write of a diagnostic line to stderr.
pub fn write_stderr(line: &[u8]) {
    let mut rest = line;
    while !rest.is_empty() {
        // SAFETY: `rest` is a live slice for the duration of the call.
        let n = unsafe { libc::write(libc::STDERR_FILENO, rest.as_ptr().cast(), rest.len()) };
        if n < 0 {
            if errno().0 == libc::EINTR {
                continue;
            }
            return;
        }
        if n == 0 {
            return;
        }
        rest = &rest[n as usize..];
    }
}
