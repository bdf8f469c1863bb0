use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use fifolink_frame::{FrameConfig, FrameEncoding, DEFAULT_READ_CHUNK_SIZE};
use fifolink_transport::FifoConfig;

use crate::exit::{CliError, CliResult, USAGE};

/// Wire encoding selector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    /// 2-byte big-endian length header, payloads up to 65535 bytes.
    U16,
    /// 1-byte length header, payloads up to 255 bytes.
    U8,
    /// Terminator byte after each payload.
    Delimited,
}

/// Link options shared by every subcommand.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Wire encoding; both ends must agree.
    #[arg(
        long,
        value_name = "ENCODING",
        default_value = "u16",
        env = "FIFOLINK_ENCODING",
        global = true
    )]
    pub encoding: EncodingArg,

    /// Terminator byte for the delimited encoding (decimal or 0x-prefixed hex).
    #[arg(long, value_name = "BYTE", default_value = "0", value_parser = parse_byte, global = true)]
    pub terminator: u8,

    /// FIFO this process reads from.
    #[arg(
        long,
        value_name = "PATH",
        default_value = FifoConfig::DEFAULT_READ_PATH,
        env = "FIFOLINK_READ_PATH",
        global = true
    )]
    pub read_path: PathBuf,

    /// FIFO this process writes to.
    #[arg(
        long,
        value_name = "PATH",
        default_value = FifoConfig::DEFAULT_WRITE_PATH,
        env = "FIFOLINK_WRITE_PATH",
        global = true
    )]
    pub write_path: PathBuf,

    /// Sleep between idle poll cycles (e.g. 10ms, 1s; 0ms busy-polls).
    #[arg(long, value_name = "DURATION", default_value = "10ms", global = true)]
    pub poll_interval: String,

    /// Bytes requested from the inbound FIFO per poll cycle.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_READ_CHUNK_SIZE, global = true)]
    pub read_chunk: usize,
}

/// Validated link configuration.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub fifo: FifoConfig,
    pub frame: FrameConfig,
    pub poll_interval: Duration,
}

impl LinkSettings {
    pub fn encoding(&self) -> FrameEncoding {
        self.frame.encoding
    }
}

impl LinkArgs {
    pub fn resolve(&self) -> CliResult<LinkSettings> {
        if self.read_chunk == 0 {
            return Err(CliError::new(USAGE, "--read-chunk must be greater than zero"));
        }

        let encoding = match self.encoding {
            EncodingArg::U16 => FrameEncoding::LengthU16,
            EncodingArg::U8 => FrameEncoding::LengthU8,
            EncodingArg::Delimited => FrameEncoding::Delimited {
                terminator: self.terminator,
            },
        };

        Ok(LinkSettings {
            fifo: FifoConfig {
                read_path: self.read_path.clone(),
                write_path: self.write_path.clone(),
                ..FifoConfig::default()
            },
            frame: FrameConfig {
                encoding,
                read_chunk_size: self.read_chunk,
                ..FrameConfig::default()
            },
            poll_interval: parse_duration(&self.poll_interval)?,
        })
    }
}

/// Short human name of an encoding for output and logs.
pub fn encoding_name(encoding: FrameEncoding) -> &'static str {
    match encoding {
        FrameEncoding::LengthU16 => "u16",
        FrameEncoding::LengthU8 => "u8",
        FrameEncoding::Delimited { .. } => "delimited",
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "ms")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

fn parse_byte(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|_| format!("expected a byte value 0-255 or 0x00-0xff, got {input:?}"))
}
