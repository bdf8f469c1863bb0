use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::config::LinkSettings;
use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod doctor;
pub mod echo;
pub mod listen;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open both FIFOs, optionally send a message, then print what arrives.
    Run(RunArgs),
    /// Read the inbound FIFO and print received messages.
    Listen(ListenArgs),
    /// Send a single message on the outbound FIFO.
    Send(SendArgs),
    /// Write every received message back to the peer.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
}

pub fn run(command: Command, settings: &LinkSettings, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, settings, format),
        Command::Listen(args) => listen::run(args, settings, format),
        Command::Send(args) => send::run(args, settings, format),
        Command::Echo(args) => echo::run(args, settings),
        Command::Version(args) => version::run(args),
        Command::Doctor(args) => doctor::run(args, settings, format),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Message to send once both FIFOs are open.
    #[arg(long, short = 'm')]
    pub message: Option<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Exit after echoing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}
