//! Fatal errors of the logging layer and process termination.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the logging infrastructure itself.
///
/// None of these are ever reported to the observed program: an audit trail
/// with holes is worse than no run at all, so the exported entry points turn
/// every one of them into [`die`].
#[derive(Debug, Error)]
pub enum ShimError {
    #[error("variable {0} undefined")]
    MissingVariable(&'static str),

    #[error("dlsym(RTLD_NEXT, \"{symbol}\"): {reason}")]
    Resolve { symbol: &'static str, reason: String },

    #[error("tracking file name {0:?} contains a NUL byte")]
    InvalidPath(PathBuf),

    #[error("open(\"{}\"): {source}", .file.display())]
    TrackingOpen { file: PathBuf, source: io::Error },

    #[error("{}: write(): {source}", .file.display())]
    TrackingWrite { file: PathBuf, source: io::Error },

    #[error("close({fd}): {source}")]
    TrackingClose { fd: libc::c_int, source: io::Error },
}

pub type Result<T> = std::result::Result<T, ShimError>;

/// Report `err` on stderr and terminate the process.
pub fn die(err: &ShimError) -> ! {
    let line = format!("libremlog: {err}\n");
    // SAFETY: fd 2 is only written to; a failed write has nowhere to go.
    unsafe {
        libc::write(libc::STDERR_FILENO, line.as_ptr().cast(), line.len());
    }
    std::process::exit(libc::EXIT_FAILURE)
}
