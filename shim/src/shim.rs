//! The per-process context and the handlers behind every exported symbol.

use std::borrow::Cow;
use std::ffi::{CStr, OsStr};
use std::os::raw::{c_char, c_int};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use libc::{mode_t, off64_t, off_t, FILE};
use once_cell::sync::OnceCell;

use crate::config::ProcessConfig;
use crate::error::Result;
use crate::event::{append_record, LogEvent};
use crate::path::{absolutize, is_excluded};
use crate::real::RealFs;
use crate::sys::{write_stderr, Guard, SavedErrno};
use crate::walk::walk_rename;

/// Flags `creat(2)` is defined in terms of.
pub const CREAT_FLAGS: c_int = libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC;

pub struct Shim<F> {
    real: F,
    config: OnceCell<ProcessConfig>,
    load_config: fn() -> Result<ProcessConfig>,
}

/// Borrow a C path argument. NULL stays `None` and is forwarded untouched.
unsafe fn c_path<'a>(ptr: *const c_char) -> Option<&'a Path> {
    if ptr.is_null() {
        return None;
    }
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    Some(Path::new(OsStr::from_bytes(bytes)))
}

unsafe fn c_text<'a>(ptr: *const c_char) -> Cow<'a, str> {
    if ptr.is_null() {
        return Cow::Borrowed("");
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy()
}

/// `mode` is only meaningful to `open` when a file may be created.
pub fn open_mode(flags: c_int, mode: mode_t) -> mode_t {
    if flags & libc::O_CREAT != 0 || flags & libc::O_TMPFILE == libc::O_TMPFILE {
        mode
    } else {
        0
    }
}

impl<F: RealFs> Shim<F> {
    pub fn new(real: F) -> Shim<F> {
        Shim::with_loader(real, ProcessConfig::from_env)
    }

    pub fn with_loader(real: F, load_config: fn() -> Result<ProcessConfig>) -> Shim<F> {
        Shim {
            real,
            config: OnceCell::new(),
            load_config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.get().is_some()
    }

    /// Establish configuration on first use; later calls never look at the
    /// environment again.
    pub fn config(&self) -> Result<&ProcessConfig> {
        self.config.get_or_try_init(|| {
            let config = (self.load_config)()?;
            if config.debug_enabled {
                write_stderr(format!("remlog :: {}\n", config.snapshot_json()).as_bytes());
            }
            Ok(config)
        })
    }

    /// Record one event, unless its target is under an excluded tree.
    pub fn log(&self, target: &Path, secondary: Option<&Path>, description: &str) -> Result<()> {
        if is_excluded(target) {
            return Ok(());
        }
        let _errno = SavedErrno::capture();
        let config = self.config()?;

        if config.debug_enabled {
            write_stderr(format!("remlog :: {description}\n").as_bytes());
        }

        let event = LogEvent {
            target: absolutize(target),
            secondary: secondary.map(absolutize),
            description: description.to_string(),
        };
        let file = config.tracking_file(std::process::id());
        append_record(&self.real, &file, &event.to_record())
    }

    /// One event per file that moved, see [`walk_rename`].
    pub fn log_rename(&self, old: &Path, new: &Path) -> Result<()> {
        let _errno = SavedErrno::capture();
        walk_rename(old, new, |old, new| {
            let description = format!("rename(\"{}\", \"{}\")", old.display(), new.display());
            self.log(new, Some(old), &description)
        })
    }

    /// Shared shape of every handler: configure unless the target is
    /// excluded, forward the call, and record it only if it succeeded.
    /// The caller sees the real call's return value and errno.
    fn observe<R>(
        &self,
        target: Option<&Path>,
        call: impl FnOnce(&F) -> R,
        succeeded: impl FnOnce(&R) -> bool,
        record: impl FnOnce(&Self, &Path) -> Result<()>,
    ) -> Result<R> {
        let guard = Guard::enter();
        if !guard.is_primary() {
            return Ok(call(&self.real));
        }

        let observed = target.filter(|p| !is_excluded(p));
        if observed.is_some() {
            self.config()?;
        }

        let ret = call(&self.real);
        if let Some(path) = observed {
            if succeeded(&ret) {
                let _errno = SavedErrno::capture();
                record(self, path)?;
            }
        }
        Ok(ret)
    }

    pub unsafe fn open(&self, path: *const c_char, flags: c_int, mode: mode_t) -> Result<c_int> {
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.open(path, flags, mode) },
            |&fd| fd != -1,
            |shim, p| shim.log(p, None, &format!("open(\"{}\", {flags})", p.display())),
        )
    }

    pub unsafe fn open64(&self, path: *const c_char, flags: c_int, mode: mode_t) -> Result<c_int> {
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.open64(path, flags, mode) },
            |&fd| fd != -1,
            |shim, p| shim.log(p, None, &format!("open64(\"{}\", {flags})", p.display())),
        )
    }

    pub unsafe fn creat(&self, path: *const c_char, mode: mode_t) -> Result<c_int> {
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.open(path, CREAT_FLAGS, mode) },
            |&fd| fd != -1,
            |shim, p| shim.log(p, None, &format!("creat(\"{}\", 0{mode:o})", p.display())),
        )
    }

    pub unsafe fn creat64(&self, path: *const c_char, mode: mode_t) -> Result<c_int> {
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.open64(path, CREAT_FLAGS, mode) },
            |&fd| fd != -1,
            |shim, p| shim.log(p, None, &format!("creat64(\"{}\")", p.display())),
        )
    }

    pub unsafe fn rename(&self, old: *const c_char, new: *const c_char) -> Result<c_int> {
        let old_path = unsafe { c_path(old) };
        self.observe(
            old_path.and(unsafe { c_path(new) }),
            |real| unsafe { real.rename(old, new) },
            |&rc| rc != -1,
            |shim, new_path| match old_path {
                Some(old_path) => shim.log_rename(old_path, new_path),
                None => Ok(()),
            },
        )
    }

    pub unsafe fn link(&self, old: *const c_char, new: *const c_char) -> Result<c_int> {
        let old_path = unsafe { c_path(old) };
        self.observe(
            old_path.and(unsafe { c_path(new) }),
            |real| unsafe { real.link(old, new) },
            |&rc| rc != -1,
            |shim, new_path| {
                let old_shown = old_path.unwrap_or(Path::new("")).display();
                let description = format!("link(\"{old_shown}\", \"{}\")", new_path.display());
                shim.log(new_path, None, &description)
            },
        )
    }

    pub unsafe fn symlink(&self, old: *const c_char, new: *const c_char) -> Result<c_int> {
        let old_path = unsafe { c_path(old) };
        self.observe(
            old_path.and(unsafe { c_path(new) }),
            |real| unsafe { real.symlink(old, new) },
            |&rc| rc != -1,
            |shim, new_path| {
                let old_path = old_path.unwrap_or(Path::new(""));
                let description = format!(
                    "symlink(\"{}\", \"{}\")",
                    old_path.display(),
                    new_path.display()
                );
                shim.log(new_path, Some(old_path), &description)
            },
        )
    }

    pub unsafe fn truncate(&self, path: *const c_char, length: off_t) -> Result<c_int> {
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.truncate(path, length) },
            |&rc| rc != -1,
            |shim, p| shim.log(p, None, &format!("truncate(\"{}\", {length})", p.display())),
        )
    }

    pub unsafe fn truncate64(&self, path: *const c_char, length: off64_t) -> Result<c_int> {
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.truncate64(path, length) },
            |&rc| rc != -1,
            |shim, p| shim.log(p, None, &format!("truncate64(\"{}\", {length})", p.display())),
        )
    }

    pub unsafe fn fopen(&self, path: *const c_char, mode: *const c_char) -> Result<*mut FILE> {
        let shown_mode = unsafe { c_text(mode) };
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.fopen(path, mode) },
            |file| !file.is_null(),
            |shim, p| {
                let description =
                    format!("fopen(\"{}\", \"{}\")", p.display(), shown_mode);
                shim.log(p, None, &description)
            },
        )
    }

    pub unsafe fn fopen64(&self, path: *const c_char, mode: *const c_char) -> Result<*mut FILE> {
        let shown_mode = unsafe { c_text(mode) };
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.fopen64(path, mode) },
            |file| !file.is_null(),
            |shim, p| {
                let description =
                    format!("fopen64(\"{}\", \"{}\")", p.display(), shown_mode);
                shim.log(p, None, &description)
            },
        )
    }

    pub unsafe fn freopen(
        &self,
        path: *const c_char,
        mode: *const c_char,
        stream: *mut FILE,
    ) -> Result<*mut FILE> {
        let shown_mode = unsafe { c_text(mode) };
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.freopen(path, mode, stream) },
            |file| !file.is_null(),
            |shim, p| {
                let description =
                    format!("freopen(\"{}\", \"{}\")", p.display(), shown_mode);
                shim.log(p, None, &description)
            },
        )
    }

    pub unsafe fn freopen64(
        &self,
        path: *const c_char,
        mode: *const c_char,
        stream: *mut FILE,
    ) -> Result<*mut FILE> {
        let shown_mode = unsafe { c_text(mode) };
        self.observe(
            unsafe { c_path(path) },
            |real| unsafe { real.freopen64(path, mode, stream) },
            |file| !file.is_null(),
            |shim, p| {
                let description =
                    format!("freopen64(\"{}\", \"{}\")", p.display(), shown_mode);
                shim.log(p, None, &description)
            },
        )
    }
}
