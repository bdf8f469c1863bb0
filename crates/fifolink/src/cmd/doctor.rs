use std::io::Read;
use std::path::{Path, PathBuf};

use fifolink_transport::{ensure_fifo, FifoConfig, InboundFifo, OutboundFifo};
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::config::LinkSettings;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, settings: &LinkSettings, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        platform_transport_check(),
        fifo_loopback_check(),
        configured_path_check("read_path", &settings.fifo.read_path),
        configured_path_check("write_path", &settings.fifo.write_path),
        distinct_paths_check(&settings.fifo),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput {
        checks,
        overall,
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("fifolink doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<20} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn platform_transport_check() -> CheckResult {
    if cfg!(unix) {
        CheckResult::new(
            "platform_transport",
            CheckStatus::Pass,
            "named pipes available",
        )
    } else {
        CheckResult::new(
            "platform_transport",
            CheckStatus::Fail,
            "named pipe transport requires a Unix platform",
        )
    }
}

/// Create a FIFO in a scratch directory and push a few bytes through it.
fn fifo_loopback_check() -> CheckResult {
    if !cfg!(unix) {
        return CheckResult::new(
            "fifo_loopback",
            CheckStatus::Skip,
            "not supported on this platform",
        );
    }

    let dir = scratch_dir();
    if let Err(err) = std::fs::create_dir_all(&dir) {
        return CheckResult::new(
            "fifo_loopback",
            CheckStatus::Fail,
            format!("{} not writable: {err}", dir.display()),
        );
    }
    let result = loopback_through(&dir.join("doctor.fifo"));
    let _ = std::fs::remove_dir_all(&dir);

    match result {
        Ok(()) => CheckResult::new(
            "fifo_loopback",
            CheckStatus::Pass,
            "mkfifo, open, write, poll and read succeeded",
        ),
        Err(detail) => CheckResult::new("fifo_loopback", CheckStatus::Fail, detail),
    }
}

fn loopback_through(path: &Path) -> Result<(), String> {
    const PROBE: &[u8] = b"ping";

    ensure_fifo(path, FifoConfig::DEFAULT_MODE).map_err(|err| err.to_string())?;
    let mut inbound = InboundFifo::open(path).map_err(|err| err.to_string())?;
    let mut outbound = OutboundFifo::open(path).map_err(|err| err.to_string())?;

    let written = outbound.write_once(PROBE).map_err(|err| err.to_string())?;
    if written != PROBE.len() {
        return Err(format!("short write: {written} of {}", PROBE.len()));
    }
    if !inbound.poll_readable().map_err(|err| err.to_string())? {
        return Err("written bytes not readable".to_string());
    }

    let mut buf = [0u8; 16];
    let read = inbound.read(&mut buf).map_err(|err| err.to_string())?;
    if &buf[..read] != PROBE {
        return Err(format!("read back {read} unexpected bytes"));
    }
    Ok(())
}

fn scratch_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("fifolink-doctor-{}-{nanos}", std::process::id()))
}

fn configured_path_check(name: &str, path: &Path) -> CheckResult {
    match std::fs::metadata(path) {
        Ok(meta) if is_fifo(&meta) => {
            CheckResult::new(name, CheckStatus::Pass, format!("{} is a fifo", path.display()))
        }
        Ok(_) => CheckResult::new(
            name,
            CheckStatus::Fail,
            format!("{} exists and is not a fifo", path.display()),
        ),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let parent_ok = path
                .parent()
                .map(|dir| dir.as_os_str().is_empty() || dir.is_dir())
                .unwrap_or(false);
            if parent_ok {
                CheckResult::new(
                    name,
                    CheckStatus::Info,
                    format!("{} will be created on first use", path.display()),
                )
            } else {
                CheckResult::new(
                    name,
                    CheckStatus::Fail,
                    format!("parent directory of {} does not exist", path.display()),
                )
            }
        }
        Err(err) => CheckResult::new(
            name,
            CheckStatus::Warn,
            format!("{}: {err}", path.display()),
        ),
    }
}

fn distinct_paths_check(config: &FifoConfig) -> CheckResult {
    if config.read_path == config.write_path {
        CheckResult::new(
            "distinct_paths",
            CheckStatus::Warn,
            "read and write paths are the same fifo; messages will loop back",
        )
    } else {
        CheckResult::new(
            "distinct_paths",
            CheckStatus::Pass,
            "read and write paths differ",
        )
    }
}

#[cfg(unix)]
fn is_fifo(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::FileTypeExt;
    meta.file_type().is_fifo()
}

#[cfg(not(unix))]
fn is_fifo(_meta: &std::fs::Metadata) -> bool {
    false
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult::new("compiled_features", CheckStatus::Info, features.join(", "))
}
