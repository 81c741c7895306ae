//! Tracking-file records and the append writer.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use errno::errno;

use crate::error::{Result, ShimError};
use crate::real::RealFs;

/// One observed mutation. Serialized as
/// `target \t secondary \t description \n`; fields are not escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub target: PathBuf,
    pub secondary: Option<PathBuf>,
    pub description: String,
}

impl LogEvent {
    pub fn to_record(&self) -> Vec<u8> {
        let target = self.target.as_os_str().as_bytes();
        let secondary = self
            .secondary
            .as_deref()
            .map_or(&[][..], |p| p.as_os_str().as_bytes());
        let mut line =
            Vec::with_capacity(target.len() + secondary.len() + self.description.len() + 3);
        line.extend_from_slice(target);
        line.push(b'\t');
        line.extend_from_slice(secondary);
        line.push(b'\t');
        line.extend_from_slice(self.description.as_bytes());
        line.push(b'\n');
        line
    }
}

/// Append `record` to `file` with a single `write(2)`.
///
/// The file is opened through the real `open`, never through the exported
/// wrapper, so logging cannot observe itself.
pub fn append_record<F: RealFs>(real: &F, file: &Path, record: &[u8]) -> Result<()> {
    let cfile = CString::new(file.as_os_str().as_bytes())
        .map_err(|_| ShimError::InvalidPath(file.to_path_buf()))?;

    // SAFETY: `cfile` is a valid NUL-terminated path.
    let fd = unsafe {
        real.open(
            cfile.as_ptr(),
            libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
            0o644,
        )
    };
    if fd < 0 {
        return Err(ShimError::TrackingOpen {
            file: file.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }

    if let Err(source) = write_once(fd, record) {
        // SAFETY: fd was opened above and is not used afterwards.
        unsafe { libc::close(fd) };
        return Err(ShimError::TrackingWrite {
            file: file.to_path_buf(),
            source,
        });
    }

    // SAFETY: fd was opened above and is closed exactly once.
    if unsafe { libc::close(fd) } < 0 {
        return Err(ShimError::TrackingClose {
            fd,
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// A short write is an error rather than a partial line followed by a
/// second append that could interleave with another writer.
fn write_once(fd: libc::c_int, record: &[u8]) -> io::Result<()> {
    loop {
        // SAFETY: `record` is a live slice for the duration of the call.
        let n = unsafe { libc::write(fd, record.as_ptr().cast(), record.len()) };
        if n < 0 {
            if errno().0 == libc::EINTR {
                continue;
            }
            return Err(io::Error::last_os_error());
        }
        if n as usize != record.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write ({n} of {} bytes)", record.len()),
            ));
        }
        return Ok(());
    }
}
