use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::cli::drive::DriveArgs;
use crate::cli::listen::ListenArgs;
use crate::cli::query::QueryArgs;
use crate::cli::scan::ScanArgs;
use crate::cli::track::TrackArgs;
use crate::error::{CliConfigError, FixtureError};
use crate::hw::{FakeBackendConfig, FakeGatt, ScanFixture, TelemetryFrames};

/// Command-line options for the Overdrive vehicle tool.
#[derive(Debug, Parser)]
#[command(name = "overdrive", about = "Drive Anki Overdrive vehicles over BLE.")]
pub struct Args {
    /// Settings file with the vehicle registry and track layout.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level override; defaults to `RUST_LOG` or `warn`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Output format; defaults to `pretty` on a terminal and `json` otherwise.
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,
    /// Uses the fake BLE backend with fixture-driven discovery and telemetry.
    #[arg(long, global = true)]
    fake: bool,
    /// Fake scan fixtures in the form `adapter|address|local_name|rssi;...`.
    #[arg(long, global = true, requires = "fake", required_if_eq("fake", "true"))]
    fake_scan: Option<ScanFixture>,
    /// Fake telemetry frames as comma-separated hexadecimal payloads.
    #[arg(long, global = true, requires = "fake")]
    fake_telemetry: Option<TelemetryFrames>,
    /// Artificial fake scan delay (e.g. `250ms`, `2s`).
    #[arg(long, global = true, requires = "fake", value_parser = parse_duration)]
    fake_discovery_delay: Option<Duration>,
    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Creates argument values directly without CLI parsing.
    ///
    /// ```
    /// use overdrive::{Args, Command, ListenArgs};
    ///
    /// let scan = Args::new(Command::Scan(Default::default()));
    /// let listen = Args::new(Command::Listen(ListenArgs::new(Some(10))));
    /// let _ = (scan, listen);
    /// ```
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            config: None,
            log_level: None,
            output: None,
            fake: false,
            fake_scan: None,
            fake_telemetry: None,
            fake_discovery_delay: None,
            command,
        }
    }

    /// Enables fake backend mode with pre-parsed fake configuration.
    ///
    /// Only settings that have a command-line flag are carried over.
    #[must_use]
    pub fn with_fake(mut self, fake: FakeArgs) -> Self {
        self.fake = true;
        self.fake_scan = Some(fake.scan);
        self.fake_telemetry = fake.telemetry;
        self.fake_discovery_delay = Some(fake.discovery_delay);
        self
    }

    /// Points settings loading at an explicit file.
    #[must_use]
    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    #[must_use]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    #[must_use]
    pub fn output_format(&self) -> Option<OutputFormat> {
        self.output
    }

    /// Splits parsed CLI arguments into command and optional fake-client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if CLI backend configuration is invalid.
    pub fn into_command_and_fake_args(self) -> anyhow::Result<(Command, Option<FakeArgs>)> {
        let Args {
            fake,
            fake_scan,
            fake_telemetry,
            fake_discovery_delay,
            command,
            ..
        } = self;

        let fake_args = if fake {
            let Some(scan) = fake_scan else {
                return Err(CliConfigError::MissingFakeScanFixture.into());
            };
            Some(FakeArgs {
                scan,
                telemetry: fake_telemetry,
                discovery_delay: fake_discovery_delay.unwrap_or(Duration::ZERO),
                connect_delay: Duration::ZERO,
                gatt: FakeGatt::default(),
                version: None,
                battery_level: None,
                unanswered_queries: 0,
            })
        } else {
            None
        };

        Ok((command, fake_args))
    }
}

/// Fake backend arguments for programmatic runs.
///
/// ```
/// let fake = overdrive::FakeArgs::builder()
///     .scan("hci0|E6:12:AB:01:02:03|Drive|-51")?
///     .telemetry("0319022e")?
///     .unanswered_queries(1)
///     .build();
/// let _ = overdrive::fake_hardware_client(fake);
/// # Ok::<(), overdrive::FixtureError>(())
/// ```
#[derive(Debug, Clone, Builder)]
pub struct FakeArgs {
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    scan: ScanFixture,
    #[builder(with = |value: &str| -> std::result::Result<_, FixtureError> { value.parse() })]
    telemetry: Option<TelemetryFrames>,
    #[builder(default)]
    discovery_delay: Duration,
    #[builder(default)]
    connect_delay: Duration,
    #[builder(default)]
    gatt: FakeGatt,
    version: Option<u16>,
    battery_level: Option<u16>,
    /// Number of queries the fake vehicle leaves unanswered.
    #[builder(default)]
    unanswered_queries: usize,
}

impl FakeArgs {
    pub(crate) fn into_backend_config(self) -> FakeBackendConfig {
        let Self {
            scan,
            telemetry,
            discovery_delay,
            connect_delay,
            gatt,
            version,
            battery_level,
            unanswered_queries,
        } = self;

        FakeBackendConfig::builder()
            .scan_fixture(scan)
            .maybe_telemetry(telemetry)
            .discovery_delay(discovery_delay)
            .connect_delay(connect_delay)
            .gatt(gatt)
            .maybe_version(version)
            .maybe_battery_level(battery_level)
            .unanswered_queries(unanswered_queries)
            .build()
    }
}

/// Supported CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan for vehicles and print what was found.
    Scan(ScanArgs),
    /// Connect to a vehicle and print its ping time, firmware version and battery level.
    Query(QueryArgs),
    /// Connect to a vehicle, drive it for a while, then stop it.
    Drive(DriveArgs),
    /// Connect to a vehicle and print its telemetry until Ctrl+C.
    Listen(ListenArgs),
    /// Print the lane transitions of one lap around the configured track.
    Track(TrackArgs),
}

/// Log level accepted by `--log-level`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_level_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Tables and coloured lines for people.
    #[default]
    Pretty,
    /// One JSON document per result.
    Json,
}

pub(crate) fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|error| error.to_string())
}
