//! shadectl: MQTT-driven roller-shutter controller.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  MqttTransport   HttpRefresher     SystemClock  LogEventSink │
//! │  (Transport)     (DeviceRefresher) (Clock)      (EventSink)  │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │            Controller (pure logic)                     │  │
//! │  │  Dispatcher · Signals · ShutterGate · Rules · Worker   │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};

use shadectl::adapters::clock::SystemClock;
use shadectl::adapters::http_refresh::HttpRefresher;
use shadectl::adapters::log_sink::LogEventSink;
use shadectl::adapters::mqtt::{self, MqttTransport};
use shadectl::config::SystemConfig;
use shadectl::Controller;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Level {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Critical | Level::Error => LevelFilter::Error,
            Level::Warning => LevelFilter::Warn,
            Level::Info => LevelFilter::Info,
            Level::Debug => LevelFilter::Debug,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "shadectl", version, about = "Reactive roller-shutter automation over MQTT")]
struct Cli {
    /// Log level; without it RUST_LOG applies, falling back to warning.
    #[arg(long = "logging-level", value_enum)]
    logging_level: Option<Level>,

    /// Append log output to this file instead of stderr.
    #[arg(long = "logging-file")]
    logging_file: Option<PathBuf>,

    /// JSON configuration; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = cli.logging_level {
        builder.filter_level(level.into());
    }
    builder.format(|buf, record| {
        let thread = std::thread::current();
        writeln!(
            buf,
            "{}, [{}], {}",
            record.level(),
            thread.name().unwrap_or("?"),
            record.args()
        )
    });
    if let Some(path) = &cli.logging_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.try_init().context("installing logger")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    info!("shadectl v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => SystemConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => SystemConfig::default(),
    };
    config.validate().context("validating configuration")?;

    let clock = Arc::new(SystemClock::new());
    let refresher = Arc::new(
        HttpRefresher::new(&config.shutter.refresh).context("building HTTP client")?,
    );
    let (transport, connection) = MqttTransport::new(&config.broker);

    let controller = Controller::new(
        &config,
        Arc::new(transport),
        refresher,
        clock,
        Arc::new(LogEventSink::new()),
    );

    mqtt::run_event_loop(connection, &controller);

    controller.shutdown();
    info!("shadectl stopped");
    Ok(())
}
