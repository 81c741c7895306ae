use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

/// Locate the built `libremlog.so`, preferring the profile this test was
/// built with.
fn library() -> Option<PathBuf> {
    let target_dir = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("target"));
    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    let lib = target_dir.join(profile).join("libremlog.so");
    lib.exists().then_some(lib)
}

fn sh_available() -> bool {
    PathBuf::from("/bin/sh").exists()
}

/// Preload the shim into `/bin/sh` and let the shell create a file through
/// a redirection.
#[test]
fn shell_redirection_is_recorded() {
    let Some(lib) = library() else {
        eprintln!("Skipping test: libremlog.so not built yet");
        return;
    };
    if !sh_available() {
        eprintln!("Skipping test: /bin/sh not found");
        return;
    }

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let created = temp_dir.path().join("created.txt");
    let template = temp_dir.path().join("track-?.log");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(format!("echo hello > '{}'", created.display()))
        .env("LD_PRELOAD", &lib)
        .env("REM_LOG_TRACKING_FILE", &template)
        .env("REM_LOG_COUNT", "3")
        .env_remove("REM_LOG_DEBUG")
        .output()
        .expect("Failed to run /bin/sh");

    assert!(
        output.status.success(),
        "sh failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(fs::read_to_string(&created).unwrap(), "hello\n");

    let logs: Vec<PathBuf> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("track-3-") && n.ends_with(".log"))
        })
        .collect();
    assert_eq!(logs.len(), 1, "expected one tracking file, found {logs:?}");

    let text = fs::read_to_string(&logs[0]).unwrap();
    let created_str = created.display().to_string();
    let record = text
        .lines()
        .find(|line| line.split('\t').next() == Some(created_str.as_str()))
        .unwrap_or_else(|| panic!("no record for {created_str} in {text:?}"));

    let fields: Vec<&str> = record.split('\t').collect();
    assert_eq!(fields.len(), 3, "{record:?}");
    assert_eq!(fields[1], "");
    assert!(fields[2].starts_with("open"), "{record:?}");
    assert!(fields[2].contains(&created_str), "{record:?}");
}

#[test]
fn missing_tracking_file_variable_is_fatal() {
    let Some(lib) = library() else {
        eprintln!("Skipping test: libremlog.so not built yet");
        return;
    };
    if !sh_available() {
        eprintln!("Skipping test: /bin/sh not found");
        return;
    }

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let created = temp_dir.path().join("never.txt");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(format!("echo hello > '{}'", created.display()))
        .env("LD_PRELOAD", &lib)
        .env_remove("REM_LOG_TRACKING_FILE")
        .output()
        .expect("Failed to run /bin/sh");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("REM_LOG_TRACKING_FILE"),
        "stderr did not name the variable: {stderr}"
    );
    assert!(!created.exists());
}

/// With no configuration at all, a program that only reads `/proc/` must run
/// as if the library were not there.
#[test]
fn proc_reads_need_no_configuration() {
    let Some(lib) = library() else {
        eprintln!("Skipping test: libremlog.so not built yet");
        return;
    };
    if !PathBuf::from("/bin/cat").exists() {
        eprintln!("Skipping test: /bin/cat not found");
        return;
    }

    let output = Command::new("/bin/cat")
        .arg("/proc/self/stat")
        .env_clear()
        .env("LD_PRELOAD", &lib)
        .output()
        .expect("Failed to run /bin/cat");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "cat failed: {stderr}");
    assert!(stderr.is_empty(), "unexpected diagnostics: {stderr}");
    assert!(!output.stdout.is_empty());
}
