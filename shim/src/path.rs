//! Which paths are logged, and how they are written down.

use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

/// Virtual filesystems that are never logged.
pub const EXCLUDED_PREFIXES: [&[u8]; 3] = [b"/dev/", b"/proc/", b"/sys/"];

pub const PROC_PREFIX: &[u8] = b"/proc/";

pub fn is_excluded(path: &Path) -> bool {
    let bytes = path.as_os_str().as_bytes();
    EXCLUDED_PREFIXES.iter().any(|prefix| bytes.starts_with(prefix))
}

/// `open` of `path` must go straight to the kernel: nothing may be resolved
/// or read from the environment before the shim is configured, and the
/// loader and libc start-up read `/proc/` early.
pub fn bypasses_shim(path: &[u8], configured: bool) -> bool {
    !configured && path.starts_with(PROC_PREFIX)
}

/// Prefix relative paths with the working directory. The path is not
/// normalized; `..` and symlinks are left for the reader of the log.
pub fn absolutize(path: &Path) -> PathBuf {
    let bytes = path.as_os_str().as_bytes();
    if bytes.first() == Some(&b'/') {
        return path.to_path_buf();
    }
    let mut out = match std::env::current_dir() {
        Ok(cwd) => cwd.into_os_string().into_vec(),
        Err(_) => b".".to_vec(),
    };
    out.push(b'/');
    out.extend_from_slice(bytes);
    PathBuf::from(OsString::from_vec(out))
}
