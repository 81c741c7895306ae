//! A `RealFs` for unit tests: forwards to libc, records every call, and can
//! be told to fail or to leave a stray errno behind on success.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use errno::{set_errno, Errno};
use libc::{mode_t, off64_t, off_t, FILE};
use parking_lot::Mutex;

use crate::real::RealFs;

#[derive(Default)]
pub struct FakeFs {
    calls: Mutex<Vec<String>>,
    fail_with: Option<c_int>,
    errno_on_success: Option<c_int>,
}

impl FakeFs {
    /// Every forwarded call fails with `errno` without touching the disk.
    pub fn failing(errno: c_int) -> FakeFs {
        FakeFs {
            fail_with: Some(errno),
            ..FakeFs::default()
        }
    }

    /// Successful calls leave `errno` set, as libc is allowed to.
    pub fn dirty_errno(errno: c_int) -> FakeFs {
        FakeFs {
            errno_on_success: Some(errno),
            ..FakeFs::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, name: &str, path: *const c_char) {
        let shown = if path.is_null() {
            "NULL".to_string()
        } else {
            // SAFETY: non-null paths handed to RealFs are C strings.
            unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned()
        };
        self.calls.lock().push(format!("{name}({shown})"));
    }

    fn int_call(&self, name: &str, path: *const c_char, call: impl FnOnce() -> c_int) -> c_int {
        self.record(name, path);
        if let Some(e) = self.fail_with {
            set_errno(Errno(e));
            return -1;
        }
        let ret = call();
        if ret != -1 {
            if let Some(e) = self.errno_on_success {
                set_errno(Errno(e));
            }
        }
        ret
    }

    fn file_call(
        &self,
        name: &str,
        path: *const c_char,
        call: impl FnOnce() -> *mut FILE,
    ) -> *mut FILE {
        self.record(name, path);
        if let Some(e) = self.fail_with {
            set_errno(Errno(e));
            return std::ptr::null_mut();
        }
        let ret = call();
        if !ret.is_null() {
            if let Some(e) = self.errno_on_success {
                set_errno(Errno(e));
            }
        }
        ret
    }
}

impl RealFs for FakeFs {
    unsafe fn open(&self, path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
        self.int_call("open", path, || unsafe { libc::open(path, flags, mode) })
    }

    unsafe fn open64(&self, path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
        self.int_call("open64", path, || unsafe { libc::open64(path, flags, mode) })
    }

    unsafe fn rename(&self, old: *const c_char, new: *const c_char) -> c_int {
        self.int_call("rename", new, || unsafe { libc::rename(old, new) })
    }

    unsafe fn link(&self, old: *const c_char, new: *const c_char) -> c_int {
        self.int_call("link", new, || unsafe { libc::link(old, new) })
    }

    unsafe fn symlink(&self, old: *const c_char, new: *const c_char) -> c_int {
        self.int_call("symlink", new, || unsafe { libc::symlink(old, new) })
    }

    unsafe fn truncate(&self, path: *const c_char, length: off_t) -> c_int {
        self.int_call("truncate", path, || unsafe { libc::truncate(path, length) })
    }

    unsafe fn truncate64(&self, path: *const c_char, length: off64_t) -> c_int {
        self.int_call("truncate64", path, || unsafe { libc::truncate64(path, length) })
    }

    unsafe fn fopen(&self, path: *const c_char, mode: *const c_char) -> *mut FILE {
        self.file_call("fopen", path, || unsafe { libc::fopen(path, mode) })
    }

    unsafe fn fopen64(&self, path: *const c_char, mode: *const c_char) -> *mut FILE {
        self.file_call("fopen64", path, || unsafe { libc::fopen64(path, mode) })
    }

    unsafe fn freopen(
        &self,
        path: *const c_char,
        mode: *const c_char,
        stream: *mut FILE,
    ) -> *mut FILE {
        self.file_call("freopen", path, || unsafe { libc::freopen(path, mode, stream) })
    }

    unsafe fn freopen64(
        &self,
        path: *const c_char,
        mode: *const c_char,
        stream: *mut FILE,
    ) -> *mut FILE {
        self.file_call("freopen64", path, || unsafe {
            libc::freopen64(path, mode, stream)
        })
    }
}
