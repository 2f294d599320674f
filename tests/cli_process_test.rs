use shared_flock::{LockMode, LockedFile, OpenMode};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_shared-flock");

/// Polls until some other process holds the exclusive lock on `path`.
fn wait_until_held(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        if path.exists() {
            let mut probe = LockedFile::open(path, OpenMode::Read, 0o600).unwrap();
            if !probe.try_lock(LockMode::Shared).unwrap() {
                return;
            }
        }
        assert!(Instant::now() < deadline, "holder never took the lock");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_reader_process_blocks_until_holder_process_releases() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.txt");
    let path_arg = path.to_str().unwrap();

    let mut holder = Command::new(BIN)
        .args(["hold", "--file", path_arg, "--seconds", "2"])
        .args(["--text", "written by the holder"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    wait_until_held(&path);

    let started = Instant::now();
    let output = Command::new(BIN)
        .args(["read", "--file", path_arg])
        .output()
        .unwrap();
    let elapsed = started.elapsed();

    assert!(holder.wait().unwrap().success());
    assert!(output.status.success());
    assert!(elapsed >= Duration::from_secs(1), "read returned after {:?}", elapsed);

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        format!("Reading file {}...\nwritten by the holder\n", path.display())
    );
}

#[test]
fn test_json_report() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.txt");
    std::fs::write(&path, "plain body").unwrap();

    let output = Command::new(BIN)
        .args(["read", "--format", "json", "--file", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["contents"], "plain body");
    assert!(report["waited_ms"].is_u64());
}

#[test]
fn test_missing_file_fails_with_message() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.txt");

    let output = Command::new(BIN)
        .args(["read", "--file", path.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("File not found"));
}

#[test]
fn test_invalid_perms_exit_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.txt");

    let output = Command::new(BIN)
        .args(["hold", "--file", path.to_str().unwrap(), "--perms", "0999"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(!path.exists());
}
