//! Emitter command-line tool
//!
//! Sends one message through an emitter of the running simulation, or
//! through the simulated controller for a dry run.

mod settings;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wb_emitter::{Emitter, NativeController, Payload};
use wb_ffi::{ControllerLibrary, FfiError};
use wb_sim::SimulatedController;

use settings::{LibrarySource, Settings};

/// Send a message through a simulator emitter device.
#[derive(Debug, Parser)]
#[command(name = "wb-emit", version, about)]
struct Cli {
    /// Path to a JSON settings file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Controller library to load instead of the configured one.
    #[arg(long, conflicts_with = "simulate")]
    library: Option<PathBuf>,

    /// Send through the simulated controller and print what it received.
    #[arg(long)]
    simulate: bool,

    /// Emitter device name.
    #[arg(short, long)]
    device: Option<String>,

    /// Simulation step to run after sending, in milliseconds.
    #[arg(long)]
    step: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send text as a NUL-terminated string.
    Text {
        /// Text to send.
        text: String,
    },

    /// Send raw bytes given as hex.
    Bytes {
        /// Payload as hex digits, e.g. "01 02 ff".
        hex: String,

        /// Number of bytes the emitter should transmit.
        #[arg(short, long, allow_negative_numbers = true)]
        length: Option<i32>,

        /// Use the payload size as the length.
        #[arg(long, conflicts_with = "length")]
        auto_length: bool,
    },

    /// Print the effective settings as JSON.
    ShowConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    apply_overrides(&mut settings, &cli);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Command::ShowConfig = cli.command {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let (payload, length) = message(&cli.command)?;
    if cli.simulate {
        run_simulated(&settings, payload, length)
    } else {
        run_native(&settings, payload, length)
    }
}

/// Command-line flags take precedence over the settings file
fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(library) = &cli.library {
        settings.library_path = Some(library.clone());
    }
    if let Some(device) = &cli.device {
        settings.device = device.clone();
    }
    if let Some(step) = cli.step {
        settings.step_ms = step;
    }
}

/// Build the payload and length argument for a send command
fn message(command: &Command) -> anyhow::Result<(Payload, Option<i32>)> {
    match command {
        Command::Text { text } => Ok((Payload::from(text), None)),
        Command::Bytes {
            hex,
            length,
            auto_length,
        } => {
            let data = parse_hex(hex)?;
            let length = if *auto_length {
                Some(i32::try_from(data.len()).context("payload too large for the emitter")?)
            } else {
                *length
            };
            Ok((Payload::Bytes(data), length))
        }
        Command::ShowConfig => bail!("show-config does not send a message"),
    }
}

/// Parse hex digits, ignoring whitespace, colons and a leading `0x`
fn parse_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();

    if let Some(bad) = digits.iter().find(|b| !b.is_ascii_hexdigit()) {
        bail!("invalid hex digit {:?} in {:?}", char::from(*bad), input);
    }
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits in {:?}", input);
    }

    digits
        .chunks(2)
        .map(|pair| -> anyhow::Result<u8> {
            let pair = std::str::from_utf8(pair)?;
            Ok(u8::from_str_radix(pair, 16)?)
        })
        .collect()
}

fn send<C: NativeController>(
    emitter: &Emitter<C>,
    payload: Payload,
    length: Option<i32>,
) -> anyhow::Result<()> {
    let kind = payload.kind();
    emitter
        .send(payload, length)
        .with_context(|| format!("emitter {:?} rejected {} message", emitter.name(), kind))?;
    info!("Sent {} message through {:?}", kind, emitter.name());
    Ok(())
}

/// Send through the simulated controller and print the recorded traffic
fn run_simulated(settings: &Settings, payload: Payload, length: Option<i32>) -> anyhow::Result<()> {
    let sim = SimulatedController::new();
    let emitter = Emitter::new(&sim, &settings.device)?;
    send(&emitter, payload, length)?;

    println!("{}", serde_json::to_string_pretty(&sim.sent())?);
    Ok(())
}

fn open_library(settings: &Settings) -> anyhow::Result<ControllerLibrary> {
    let library = match settings.library_source() {
        LibrarySource::Path(path) => ControllerLibrary::open(path)?,
        LibrarySource::Home(home) => ControllerLibrary::from_webots_home(home)?,
        LibrarySource::Environment => ControllerLibrary::from_env()?,
    };
    Ok(library)
}

/// Robot lifecycle calls of the controller library
trait RobotSession: NativeController {
    fn init(&self) -> Result<i32, FfiError>;
    fn step(&self, duration_ms: i32) -> Result<i32, FfiError>;
    fn cleanup(&self) -> Result<(), FfiError>;
}

impl RobotSession for ControllerLibrary {
    fn init(&self) -> Result<i32, FfiError> {
        self.robot_init()
    }

    fn step(&self, duration_ms: i32) -> Result<i32, FfiError> {
        self.robot_step(duration_ms)
    }

    fn cleanup(&self) -> Result<(), FfiError> {
        self.robot_cleanup()
    }
}

/// Send through the real controller library, attached to the running simulation
fn run_native(settings: &Settings, payload: Payload, length: Option<i32>) -> anyhow::Result<()> {
    let step_ms = i32::try_from(settings.step_ms).context("step duration too large")?;
    let library = open_library(settings)?;
    info!("Using controller library {}", library.path().display());

    run_session(&library, &settings.device, step_ms, payload, length)
}

/// Attach, send, step once, and detach again whatever happened in between
fn run_session<S: RobotSession>(
    session: &S,
    device: &str,
    step_ms: i32,
    payload: Payload,
    length: Option<i32>,
) -> anyhow::Result<()> {
    let status = session.init()?;
    info!("Attached to simulation (status {})", status);

    let result = Emitter::new(session, device)
        .map_err(anyhow::Error::from)
        .and_then(|emitter| send(&emitter, payload, length))
        .and_then(|()| -> anyhow::Result<()> {
            // The message leaves the emitter on the next simulation step
            if session.step(step_ms)? == -1 {
                warn!("Simulation asked the controller to quit");
            }
            Ok(())
        });

    let cleanup = session.cleanup();
    result?;
    cleanup?;
    Ok(())
}
