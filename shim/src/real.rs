//! The real (non-intercepted) libc implementations.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};

use libc::{mode_t, off64_t, off_t, FILE};

use crate::error::{Result, ShimError};

/// Provider of the filesystem operations the shim forwards to.
///
/// Every method has the exact contract of the libc function of the same
/// name, errno included.
pub trait RealFs {
    unsafe fn open(&self, path: *const c_char, flags: c_int, mode: mode_t) -> c_int;
    unsafe fn open64(&self, path: *const c_char, flags: c_int, mode: mode_t) -> c_int;
    unsafe fn rename(&self, old: *const c_char, new: *const c_char) -> c_int;
    unsafe fn link(&self, old: *const c_char, new: *const c_char) -> c_int;
    unsafe fn symlink(&self, old: *const c_char, new: *const c_char) -> c_int;
    unsafe fn truncate(&self, path: *const c_char, length: off_t) -> c_int;
    unsafe fn truncate64(&self, path: *const c_char, length: off64_t) -> c_int;
    unsafe fn fopen(&self, path: *const c_char, mode: *const c_char) -> *mut FILE;
    unsafe fn fopen64(&self, path: *const c_char, mode: *const c_char) -> *mut FILE;
    unsafe fn freopen(&self, path: *const c_char, mode: *const c_char, stream: *mut FILE)
        -> *mut FILE;
    unsafe fn freopen64(
        &self,
        path: *const c_char,
        mode: *const c_char,
        stream: *mut FILE,
    ) -> *mut FILE;
}

type OpenFn = unsafe extern "C" fn(*const c_char, c_int, ...) -> c_int;
type TwoPathFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
type TruncateFn = unsafe extern "C" fn(*const c_char, off_t) -> c_int;
type Truncate64Fn = unsafe extern "C" fn(*const c_char, off64_t) -> c_int;
type FopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
type FreopenFn = unsafe extern "C" fn(*const c_char, *const c_char, *mut FILE) -> *mut FILE;

/// Function pointers found with `dlsym(RTLD_NEXT, ..)`, i.e. the next
/// definition after this library in the lookup order.
#[derive(Clone, Copy)]
pub struct LibcFs {
    open: OpenFn,
    open64: OpenFn,
    rename: TwoPathFn,
    link: TwoPathFn,
    symlink: TwoPathFn,
    truncate: TruncateFn,
    truncate64: Truncate64Fn,
    fopen: FopenFn,
    fopen64: FopenFn,
    freopen: FreopenFn,
    freopen64: FreopenFn,
}

macro_rules! next_symbol {
    ($sym_name:literal, $ty:ty) => {{
        const NAME_BYTES: &[u8] = concat!($sym_name, "\0").as_bytes();
        // SAFETY: NAME_BYTES is a literal with exactly one trailing NUL.
        let cname = unsafe { CStr::from_bytes_with_nul_unchecked(NAME_BYTES) };
        let sym = lookup_next($sym_name, cname)?;
        // SAFETY: the libc symbol of this name has the signature `$ty`.
        unsafe { std::mem::transmute::<*mut c_void, $ty>(sym) }
    }};
}

fn lookup_next(symbol: &'static str, cname: &CStr) -> Result<*mut c_void> {
    // SAFETY: dlerror/dlsym are called with a valid C string; dlerror's
    // result is copied out before any further dl* call.
    unsafe {
        libc::dlerror();
        let sym = libc::dlsym(libc::RTLD_NEXT, cname.as_ptr());
        if !sym.is_null() {
            return Ok(sym);
        }
        let err = libc::dlerror();
        let reason = if err.is_null() {
            "failed".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        };
        Err(ShimError::Resolve { symbol, reason })
    }
}

impl LibcFs {
    /// Resolve every forwarded symbol; any missing one is an error.
    pub fn resolve() -> Result<LibcFs> {
        Ok(LibcFs {
            open: next_symbol!("open", OpenFn),
            open64: next_symbol!("open64", OpenFn),
            rename: next_symbol!("rename", TwoPathFn),
            link: next_symbol!("link", TwoPathFn),
            symlink: next_symbol!("symlink", TwoPathFn),
            truncate: next_symbol!("truncate", TruncateFn),
            truncate64: next_symbol!("truncate64", Truncate64Fn),
            fopen: next_symbol!("fopen", FopenFn),
            fopen64: next_symbol!("fopen64", FopenFn),
            freopen: next_symbol!("freopen", FreopenFn),
            freopen64: next_symbol!("freopen64", FreopenFn),
        })
    }
}

impl RealFs for LibcFs {
    unsafe fn open(&self, path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
        unsafe { (self.open)(path, flags, mode as libc::c_uint) }
    }

    unsafe fn open64(&self, path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
        unsafe { (self.open64)(path, flags, mode as libc::c_uint) }
    }

    unsafe fn rename(&self, old: *const c_char, new: *const c_char) -> c_int {
        unsafe { (self.rename)(old, new) }
    }

    unsafe fn link(&self, old: *const c_char, new: *const c_char) -> c_int {
        unsafe { (self.link)(old, new) }
    }

    unsafe fn symlink(&self, old: *const c_char, new: *const c_char) -> c_int {
        unsafe { (self.symlink)(old, new) }
    }

    unsafe fn truncate(&self, path: *const c_char, length: off_t) -> c_int {
        unsafe { (self.truncate)(path, length) }
    }

    unsafe fn truncate64(&self, path: *const c_char, length: off64_t) -> c_int {
        unsafe { (self.truncate64)(path, length) }
    }

    unsafe fn fopen(&self, path: *const c_char, mode: *const c_char) -> *mut FILE {
        unsafe { (self.fopen)(path, mode) }
    }

    unsafe fn fopen64(&self, path: *const c_char, mode: *const c_char) -> *mut FILE {
        unsafe { (self.fopen64)(path, mode) }
    }

    unsafe fn freopen(
        &self,
        path: *const c_char,
        mode: *const c_char,
        stream: *mut FILE,
    ) -> *mut FILE {
        unsafe { (self.freopen)(path, mode, stream) }
    }

    unsafe fn freopen64(
        &self,
        path: *const c_char,
        mode: *const c_char,
        stream: *mut FILE,
    ) -> *mut FILE {
        unsafe { (self.freopen64)(path, mode, stream) }
    }
}
