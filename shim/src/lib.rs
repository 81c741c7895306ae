//! `libremlog`: preload into a program to record every file it creates,
//! opens, renames, links, symlinks or truncates.
//!
//! ```text
//! LD_PRELOAD=/path/to/libremlog.so REM_LOG_TRACKING_FILE=/tmp/track-?.log make install
//! ```
//!
//! Each successful call appends `target \t secondary \t call` to the
//! tracking file; `?` in its name becomes `<REM_LOG_COUNT>-<pid>`.

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::missing_safety_doc)]

#[cfg(not(target_os = "linux"))]
compile_error!("This shim currently targets Linux/glibc (LD_PRELOAD).");

pub mod config;
pub mod error;
pub mod event;
pub mod path;
pub mod real;
pub mod shim;
pub mod sys;
pub mod walk;

// The test harness must keep using libc's own open/fopen.
#[cfg(not(test))]
mod interpose;

#[cfg(test)]
mod testing;
