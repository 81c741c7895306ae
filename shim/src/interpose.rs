//! Exported symbols. With the library preloaded, the dynamic linker binds
//! the program's calls to these instead of libc's.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use libc::{mode_t, off64_t, off_t, FILE};
use once_cell::sync::OnceCell;

use crate::error::{die, Result};
use crate::path::bypasses_shim;
use crate::real::LibcFs;
use crate::shim::{open_mode, Shim};
use crate::sys::open_unhooked;

static SHIM: OnceCell<Shim<LibcFs>> = OnceCell::new();

// Symbols are resolved here, ahead of configuration; resolution reads no
// environment, so excluded paths never touch it.
fn shim() -> &'static Shim<LibcFs> {
    SHIM.get_or_init(|| match LibcFs::resolve() {
        Ok(real) => Shim::new(real),
        Err(err) => die(&err),
    })
}

#[inline]
fn finish<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|err| die(&err))
}

unsafe fn proc_bypass(path: *const c_char) -> bool {
    if path.is_null() {
        return false;
    }
    let configured = SHIM.get().is_some_and(Shim::is_configured);
    bypasses_shim(unsafe { CStr::from_ptr(path) }.to_bytes(), configured)
}

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let mode = open_mode(flags, mode);
    if unsafe { proc_bypass(path) } {
        return unsafe { open_unhooked(path, flags, mode) };
    }
    finish(unsafe { shim().open(path, flags, mode) })
}

#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    let mode = open_mode(flags, mode);
    if unsafe { proc_bypass(path) } {
        return unsafe { open_unhooked(path, flags | libc::O_LARGEFILE, mode) };
    }
    finish(unsafe { shim().open64(path, flags, mode) })
}

#[no_mangle]
pub unsafe extern "C" fn creat(path: *const c_char, mode: mode_t) -> c_int {
    finish(unsafe { shim().creat(path, mode) })
}

#[no_mangle]
pub unsafe extern "C" fn creat64(path: *const c_char, mode: mode_t) -> c_int {
    finish(unsafe { shim().creat64(path, mode) })
}

#[no_mangle]
pub unsafe extern "C" fn rename(old: *const c_char, new: *const c_char) -> c_int {
    finish(unsafe { shim().rename(old, new) })
}

#[no_mangle]
pub unsafe extern "C" fn link(old: *const c_char, new: *const c_char) -> c_int {
    finish(unsafe { shim().link(old, new) })
}

#[no_mangle]
pub unsafe extern "C" fn symlink(old: *const c_char, new: *const c_char) -> c_int {
    finish(unsafe { shim().symlink(old, new) })
}

#[no_mangle]
pub unsafe extern "C" fn truncate(path: *const c_char, length: off_t) -> c_int {
    finish(unsafe { shim().truncate(path, length) })
}

#[no_mangle]
pub unsafe extern "C" fn truncate64(path: *const c_char, length: off64_t) -> c_int {
    finish(unsafe { shim().truncate64(path, length) })
}

#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE {
    finish(unsafe { shim().fopen(path, mode) })
}

#[no_mangle]
pub unsafe extern "C" fn fopen64(path: *const c_char, mode: *const c_char) -> *mut FILE {
    finish(unsafe { shim().fopen64(path, mode) })
}

#[no_mangle]
pub unsafe extern "C" fn freopen(
    path: *const c_char,
    mode: *const c_char,
    stream: *mut FILE,
) -> *mut FILE {
    finish(unsafe { shim().freopen(path, mode, stream) })
}

#[no_mangle]
pub unsafe extern "C" fn freopen64(
    path: *const c_char,
    mode: *const c_char,
    stream: *mut FILE,
) -> *mut FILE {
    finish(unsafe { shim().freopen64(path, mode, stream) })
}
