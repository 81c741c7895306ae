//! Process-wide configuration read from the environment.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Result, ShimError};

pub const TRACKING_FILE_VAR: &str = "REM_LOG_TRACKING_FILE";
pub const DEBUG_VAR: &str = "REM_LOG_DEBUG";
pub const COUNT_VAR: &str = "REM_LOG_COUNT";

/// Character in the template replaced by `<run counter>-<pid>`.
pub const SUBSTITUTION_TOKEN: u8 = b'?';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    pub tracking_file_template: OsString,
    pub debug_enabled: bool,
    pub run_counter: u32,
}

/// What the debug stream reports once configuration is established.
#[derive(Serialize)]
struct Snapshot<'a> {
    event: &'static str,
    pid: u32,
    tracking_file_template: &'a str,
    debug_enabled: bool,
    run_counter: u32,
}

impl ProcessConfig {
    pub fn from_env() -> Result<ProcessConfig> {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<ProcessConfig> {
        let tracking_file_template =
            lookup(TRACKING_FILE_VAR).ok_or(ShimError::MissingVariable(TRACKING_FILE_VAR))?;
        let debug_enabled = lookup(DEBUG_VAR).is_some_and(|v| v == "yes");
        let run_counter = lookup(COUNT_VAR).map_or(0, |v| parse_counter(&v));
        Ok(ProcessConfig {
            tracking_file_template,
            debug_enabled,
            run_counter,
        })
    }

    /// Tracking file for the process `pid`: every token in the template is
    /// replaced with `<run_counter>-<pid>`.
    pub fn tracking_file(&self, pid: u32) -> PathBuf {
        let stamp = format!("{}-{}", self.run_counter, pid);
        let mut out = Vec::with_capacity(self.tracking_file_template.len() + stamp.len());
        for &b in self.tracking_file_template.as_bytes() {
            if b == SUBSTITUTION_TOKEN {
                out.extend_from_slice(stamp.as_bytes());
            } else {
                out.push(b);
            }
        }
        PathBuf::from(OsString::from_vec(out))
    }

    pub(crate) fn snapshot_json(&self) -> String {
        let snapshot = Snapshot {
            event: "configured",
            pid: std::process::id(),
            tracking_file_template: &self.tracking_file_template.to_string_lossy(),
            debug_enabled: self.debug_enabled,
            run_counter: self.run_counter,
        };
        serde_json::to_string(&snapshot).unwrap_or_default()
    }
}

/// atoi-style: leading whitespace, one optional sign, then decimal digits;
/// anything else ends the number. The result is taken modulo 2^32 the way a
/// C `int` stored into an `unsigned` is, so `-1` is `u32::MAX`.
fn parse_counter(raw: &OsStr) -> u32 {
    let mut bytes = raw
        .as_bytes()
        .iter()
        .copied()
        .skip_while(u8::is_ascii_whitespace)
        .peekable();
    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };
    // strtol saturates at the range of `long`.
    let magnitude = bytes
        .take_while(u8::is_ascii_digit)
        .try_fold(0i64, |acc, d| acc.checked_mul(10)?.checked_add(i64::from(d - b'0')))
        .unwrap_or(i64::MAX);
    let value = if negative {
        magnitude.checked_neg().unwrap_or(i64::MIN)
    } else {
        magnitude
    };
    value as i32 as u32
}
