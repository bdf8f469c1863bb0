#![cfg(all(unix, feature = "cli"))]

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use fifolink::transport::{ensure_fifo, FifoConfig, InboundFifo};

const TIMEOUT: Duration = Duration::from_secs(5);

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "fifolink-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn make_fifo(path: &Path) {
    ensure_fifo(path, FifoConfig::DEFAULT_MODE).expect("fifo should be creatable");
}

fn fifolink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fifolink"));
    cmd.arg("--log-level").arg("error");
    cmd
}

/// Open the write end without blocking, retrying until a reader shows up.
fn open_writer(path: &Path) -> File {
    let start = Instant::now();
    loop {
        match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
        {
            Ok(file) => return file,
            Err(err) if err.raw_os_error() == Some(libc::ENXIO) => {
                if start.elapsed() >= TIMEOUT {
                    panic!("no reader appeared on {}", path.display());
                }
                thread::sleep(Duration::from_millis(20));
            }
            Err(err) => panic!("open {} failed: {err}", path.display()),
        }
    }
}

/// Read from `inbound` until `want` bytes have arrived.
fn read_exact_polling(inbound: &mut InboundFifo, want: usize) -> Vec<u8> {
    let start = Instant::now();
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    while out.len() < want {
        if start.elapsed() >= TIMEOUT {
            panic!("timed out with {} of {want} bytes", out.len());
        }
        if !inbound.poll_readable().expect("poll should succeed") {
            thread::sleep(Duration::from_millis(10));
            continue;
        }
        match inbound.read(&mut buf) {
            Ok(0) => thread::sleep(Duration::from_millis(10)),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => panic!("read failed: {err}"),
        }
    }
    out
}

fn wait_with_timeout(mut child: Child) -> Output {
    let start = Instant::now();
    loop {
        match child.try_wait().expect("child should be waitable") {
            Some(_) => return child.wait_with_output().expect("output should be collected"),
            None if start.elapsed() >= TIMEOUT => {
                let _ = child.kill();
                let output = child.wait_with_output().expect("output should be collected");
                panic!(
                    "child timed out; stderr: {}",
                    String::from_utf8_lossy(&output.stderr)
                );
            }
            None => thread::sleep(Duration::from_millis(20)),
        }
    }
}

#[test]
fn listen_prints_reassembled_messages() {
    let dir = unique_temp_dir("listen");
    let inbound = dir.join("in.fifo");
    make_fifo(&inbound);

    let child = fifolink()
        .arg("--format")
        .arg("json")
        .arg("--read-path")
        .arg(&inbound)
        .arg("listen")
        .arg("--count")
        .arg("2")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");

    let mut writer = open_writer(&inbound);
    writer
        .write_all(&[0x00, 0x02, b'h', b'i', 0x00, 0x03, b'a'])
        .expect("first write should succeed");
    thread::sleep(Duration::from_millis(50));
    writer.write_all(b"bc").expect("second write should succeed");

    let output = wait_with_timeout(child);
    drop(writer);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let messages: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["length"], 2);
    assert_eq!(messages[0]["payload"], "hi");
    assert_eq!(messages[1]["length"], 3);
    assert_eq!(messages[1]["payload"], "abc");
    assert_eq!(messages[1]["encoding"], "u16");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_writes_one_length_prefixed_frame() {
    let dir = unique_temp_dir("send");
    let outbound = dir.join("out.fifo");
    make_fifo(&outbound);
    let mut reader = InboundFifo::open(&outbound).expect("reader should open");

    let child = fifolink()
        .arg("--format")
        .arg("json")
        .arg("--write-path")
        .arg(&outbound)
        .arg("send")
        .arg("--data")
        .arg("hi")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("send should start");

    let output = wait_with_timeout(child);
    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("send should emit json");
    assert_eq!(report["written"], 4);
    assert_eq!(report["requested"], 4);
    assert_eq!(report["complete"], true);

    assert_eq!(read_exact_polling(&mut reader, 4), vec![0x00, 0x02, b'h', b'i']);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn oversized_u8_payload_is_rejected_without_a_reader() {
    let dir = unique_temp_dir("oversized");
    let outbound = dir.join("out.fifo");

    let output = fifolink()
        .arg("--encoding")
        .arg("u8")
        .arg("--write-path")
        .arg(&outbound)
        .arg("send")
        .arg("--data")
        .arg("x".repeat(256))
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("payload too large"));
    assert!(!outbound.exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn terminator_inside_payload_is_rejected() {
    let dir = unique_temp_dir("terminator");

    let output = fifolink()
        .arg("--encoding")
        .arg("delimited")
        .arg("--terminator")
        .arg("0x2c")
        .arg("--write-path")
        .arg(dir.join("out.fifo"))
        .arg("send")
        .arg("--data")
        .arg("a,b")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn run_sends_greeting_and_receives_reply() {
    let dir = unique_temp_dir("run");
    let to_peer = dir.join("to-peer.fifo");
    let from_peer = dir.join("from-peer.fifo");
    make_fifo(&to_peer);
    make_fifo(&from_peer);

    // Holding the read end lets the child's blocking outbound open complete.
    let mut greeting_reader = InboundFifo::open(&to_peer).expect("reader should open");

    let child = fifolink()
        .arg("--format")
        .arg("json")
        .arg("--encoding")
        .arg("delimited")
        .arg("--read-path")
        .arg(&from_peer)
        .arg("--write-path")
        .arg(&to_peer)
        .arg("run")
        .arg("--message")
        .arg("HELLO")
        .arg("--count")
        .arg("1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("run should start");

    assert_eq!(read_exact_polling(&mut greeting_reader, 6), b"HELLO\0");

    let mut writer = open_writer(&from_peer);
    writer.write_all(b"pong\0").expect("reply should be written");

    let output = wait_with_timeout(child);
    drop(writer);
    assert!(output.status.success());
    let message: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("run should emit json");
    assert_eq!(message["payload"], "pong");
    assert_eq!(message["length"], 4);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn echo_writes_each_message_back() {
    let dir = unique_temp_dir("echo");
    let to_peer = dir.join("to-peer.fifo");
    let from_peer = dir.join("from-peer.fifo");
    make_fifo(&to_peer);
    make_fifo(&from_peer);
    let mut echo_reader = InboundFifo::open(&to_peer).expect("reader should open");

    let child = fifolink()
        .arg("--encoding")
        .arg("u8")
        .arg("--read-path")
        .arg(&from_peer)
        .arg("--write-path")
        .arg(&to_peer)
        .arg("echo")
        .arg("--count")
        .arg("1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("echo should start");

    let mut writer = open_writer(&from_peer);
    writer
        .write_all(&[0x03, b'a', b'b', b'c'])
        .expect("message should be written");

    let output = wait_with_timeout(child);
    drop(writer);
    assert!(output.status.success());
    assert_eq!(
        read_exact_polling(&mut echo_reader, 4),
        vec![0x03, b'a', b'b', b'c']
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn doctor_passes_with_scratch_paths() {
    let dir = unique_temp_dir("doctor");

    let output = fifolink()
        .arg("--format")
        .arg("json")
        .arg("--read-path")
        .arg(dir.join("in.fifo"))
        .arg("--write-path")
        .arg(dir.join("out.fifo"))
        .arg("doctor")
        .output()
        .expect("doctor should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let report: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("doctor should emit json");
    assert_eq!(report["overall"], "pass");
    assert!(report["checks"]
        .as_array()
        .expect("checks should be an array")
        .iter()
        .any(|check| check["name"] == "fifo_loopback" && check["status"] == "pass"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_reports_package_version() {
    let output = fifolink()
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("fifolink {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn zero_read_chunk_is_a_usage_error() {
    let output = fifolink()
        .arg("--read-chunk")
        .arg("0")
        .arg("version")
        .output()
        .expect("version should run");

    assert_eq!(output.status.code(), Some(64));
}
