//! Exit codes and messages of the two binaries.

use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_dump_csv_without_arguments_exits_1() {
    let out = Command::new(env!("CARGO_BIN_EXE_dump-csv")).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_dump_csv_missing_device_exits_1() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("log.csv");

    let out = Command::new(env!("CARGO_BIN_EXE_dump-csv"))
        .arg("/dev/no-such-serial-device")
        .arg(&csv)
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("/dev/no-such-serial-device"));
    assert!(!csv.exists());
}

#[cfg(unix)]
#[test]
fn test_server_aborts_when_generation_fails() {
    let dir = tempdir().unwrap();
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let out = Command::new(env!("CARGO_BIN_EXE_https-dev-server"))
        .args(["--port", &port.to_string()])
        .arg("--dir")
        .arg(dir.path())
        .arg("--cert")
        .arg(dir.path().join("certs/localhost.crt"))
        .arg("--key")
        .arg(dir.path().join("certs/localhost.key"))
        .args(["--openssl", "false"])
        .output()
        .unwrap();

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Failed to generate certificate with openssl"));
    assert!(stderr.contains("provide --cert/--key"));
    assert!(!String::from_utf8_lossy(&out.stdout).contains("Serving HTTPS"));
}
