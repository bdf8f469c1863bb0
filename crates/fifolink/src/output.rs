use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fifolink_frame::{FrameEncoding, SendReport};
use serde::Serialize;

use crate::config::encoding_name;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    encoding: &'a str,
    length: usize,
    payload: String,
    source: String,
    timestamp: String,
}

#[derive(Serialize)]
struct SendOutput<'a> {
    encoding: &'a str,
    written: usize,
    requested: usize,
    complete: bool,
    destination: String,
}

pub fn print_message(
    length: usize,
    payload: &[u8],
    source: &Path,
    encoding: FrameEncoding,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                encoding: encoding_name(encoding),
                length,
                payload: payload_preview(payload),
                source: source.display().to_string(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ENCODING", "LENGTH", "SOURCE", "PAYLOAD"])
                .add_row(vec![
                    encoding_name(encoding).to_string(),
                    length.to_string(),
                    source.display().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "RECEIVED MESSAGE WITH LENGTH {length} ({}): {}",
                encoding_name(encoding),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

pub fn print_send_report(
    report: &SendReport,
    destination: &Path,
    encoding: FrameEncoding,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = SendOutput {
                encoding: encoding_name(encoding),
                written: report.written,
                requested: report.requested,
                complete: report.is_complete(),
                destination: destination.display().to_string(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DESTINATION", "WRITTEN", "REQUESTED", "COMPLETE"])
                .add_row(vec![
                    destination.display().to_string(),
                    report.written.to_string(),
                    report.requested.to_string(),
                    report.is_complete().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!(
                "{} bytes sent out of {}",
                report.written, report.requested
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_shows_text_and_summarises_binary() {
        assert_eq!(payload_preview(b"hi"), "hi");
        assert_eq!(payload_preview(&[0xFF, 0xFE, 0x00]), "<binary 3 bytes>");
    }

    #[test]
    fn message_output_serializes() {
        let out = MessageOutput {
            encoding: "u16",
            length: 2,
            payload: "hi".to_string(),
            source: "/tmp/pyfifo".to_string(),
            timestamp: "0".to_string(),
        };
        let json = serde_json::to_string(&out).expect("message output should serialize");
        assert!(json.contains("\"length\":2"));
        assert!(json.contains("\"payload\":\"hi\""));
    }

    #[test]
    fn send_output_carries_only_report_fields() {
        let out = SendOutput {
            encoding: "u8",
            written: 3,
            requested: 4,
            complete: false,
            destination: "/tmp/cfifo".to_string(),
        };
        let value = serde_json::to_value(&out).expect("send output should serialize");
        let mut keys: Vec<&str> = value
            .as_object()
            .expect("send output should be an object")
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            ["complete", "destination", "encoding", "requested", "written"]
        );
    }
}
