use std::io;
use std::time::Duration;

use anyhow::Result;
use bon::Builder;
use owo_colors::OwoColorize;
use tracing::{Span, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::cli::{Command, DEFAULT_SCAN_DURATION, FakeArgs, LogLevel, OutputFormat};
use crate::config::Settings;
use crate::error::VehicleError;
use crate::hw::{
    HardwareClient, fake_hardware_client as build_fake_hardware_client,
    real_hardware_client as build_real_hardware_client,
};
use crate::telemetry;
use crate::terminal::{SystemTerminalClient, TerminalClient};
use crate::vehicle::Vehicle;

/// Creates a hardware client backed by the real BLE transport.
#[must_use]
pub fn real_hardware_client() -> Box<dyn HardwareClient> {
    build_real_hardware_client()
}

/// Creates a hardware client backed by fake BLE fixtures.
#[must_use]
pub fn fake_hardware_client(fake_args: FakeArgs) -> Box<dyn HardwareClient> {
    build_fake_hardware_client(fake_args.into_backend_config())
}

/// App-level helper that picks a discovered vehicle and opens its session.
pub struct VehicleConnector {
    hardware_client: Box<dyn HardwareClient>,
    settings: Settings,
    prefix: String,
    scan_duration: Duration,
}

impl VehicleConnector {
    /// Creates a connector that takes the first vehicle found.
    ///
    /// ```
    /// let connector = overdrive::VehicleConnector::new(
    ///     overdrive::real_hardware_client(),
    ///     overdrive::Settings::default(),
    /// )
    /// .with_prefix("E6:12");
    /// let _ = connector;
    /// ```
    #[must_use]
    pub fn new(hardware_client: Box<dyn HardwareClient>, settings: Settings) -> Self {
        Self {
            hardware_client,
            settings,
            prefix: String::new(),
            scan_duration: DEFAULT_SCAN_DURATION,
        }
    }

    /// Restricts the search to vehicles whose id or address starts with
    /// `prefix`, ignoring case.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_scan_duration(mut self, scan_duration: Duration) -> Self {
        self.scan_duration = scan_duration;
        self
    }

    /// Scans and wraps the first matching vehicle in a disconnected session
    /// configured from the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or no vehicle matches.
    #[instrument(skip(self), level = "info", fields(prefix = %self.prefix))]
    pub async fn find_first(self) -> Result<Vehicle> {
        let span = Span::current();
        span.pb_set_message("Scanning for vehicles");

        let found = self
            .hardware_client
            .discover_vehicles(self.scan_duration)
            .await
            .map_err(anyhow::Error::from)
            .and_then(|vehicles| {
                vehicles
                    .into_iter()
                    .find(|vehicle| vehicle.device().matches_prefix(&self.prefix))
                    .ok_or_else(|| {
                        VehicleError::NoVehicleFound {
                            prefix: self.prefix.clone(),
                        }
                        .into()
                    })
            });

        match found {
            Ok(peripheral) => {
                let setup = self.settings.vehicle_setup(peripheral.device());
                span.pb_set_finish_message(&format!(
                    "{} Found {}",
                    "✓".green(),
                    peripheral.device().address()
                ));
                Ok(Vehicle::new(peripheral, setup))
            }
            Err(error) => {
                span.pb_set_finish_message(&format!("{} No vehicle found", "✗".red()));
                Err(error)
            }
        }
    }

    /// Scans for the first matching vehicle and connects to it.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery or connection fails.
    pub async fn connect_first(self) -> Result<Vehicle> {
        let vehicle = self.find_first().await?;
        connect_vehicle(&vehicle).await?;
        Ok(vehicle)
    }
}

/// Connects `vehicle` while showing progress.
///
/// # Errors
///
/// Returns an error if the session cannot be established.
#[instrument(skip(vehicle), level = "info", fields(address = vehicle.address()))]
pub async fn connect_vehicle(vehicle: &Vehicle) -> Result<()> {
    let span = Span::current();
    span.pb_set_message("Connecting");
    match vehicle.connect().await {
        Ok(()) => {
            span.pb_set_finish_message(&format!("{} Connected", "✓".green()));
            Ok(())
        }
        Err(error) => {
            span.pb_set_finish_message(&format!("{} Connection failed", "✗".red()));
            Err(error.into())
        }
    }
}

/// Options shared by every command run.
#[derive(Debug, Default, Builder)]
pub struct RunOptions {
    #[builder(default)]
    settings: Settings,
    #[builder(default)]
    output_format: OutputFormat,
    log_level: Option<LogLevel>,
}

/// Runs the CLI command against `hardware_client`.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// use clap::Parser;
///
/// let args = overdrive::Args::try_parse_from([
///     "overdrive",
///     "--fake",
///     "--fake-scan",
///     "hci0|E6:12:AB:01:02:03|Drive|-51",
///     "scan",
/// ])?;
/// let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
/// let hardware_client = match maybe_fake_args {
///     Some(fake_args) => overdrive::fake_hardware_client(fake_args),
///     None => overdrive::real_hardware_client(),
/// };
/// let mut out = Vec::new();
/// overdrive::run(command, &mut out, hardware_client, overdrive::RunOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
pub async fn run<W>(
    command: Command,
    out: &mut W,
    hardware_client: Box<dyn HardwareClient>,
    options: RunOptions,
) -> Result<()>
where
    W: io::Write,
{
    run_with_clients(command, out, &SystemTerminalClient, hardware_client, options).await
}

/// Runs the CLI command with injected clients.
///
/// ```
/// # async fn run() -> anyhow::Result<()> {
/// struct FakeTerminal;
/// impl overdrive::TerminalClient for FakeTerminal {
///     fn stdout_is_terminal(&self) -> bool { false }
///     fn stderr_is_terminal(&self) -> bool { false }
/// }
///
/// let fake = overdrive::FakeArgs::builder()
///     .scan("hci0|E6:12:AB:01:02:03|Drive|-51")?
///     .build();
/// let options = overdrive::RunOptions::builder()
///     .output_format(overdrive::OutputFormat::Json)
///     .log_level(overdrive::LogLevel::Off)
///     .build();
/// let mut out = Vec::new();
/// overdrive::run_with_clients(
///     overdrive::Command::Query(overdrive::QueryArgs::default()),
///     &mut out,
///     &FakeTerminal,
///     overdrive::fake_hardware_client(fake),
///     options,
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if tracing initialisation fails, BLE interaction fails, or
/// output writing fails.
#[instrument(
    skip(out, terminal_client, hardware_client, options),
    level = "info",
    fields(
        command = %command_name(&command),
        output_format = ?options.output_format,
        log_level = ?options.log_level
    )
)]
pub async fn run_with_clients<W>(
    command: Command,
    out: &mut W,
    terminal_client: &dyn TerminalClient,
    hardware_client: Box<dyn HardwareClient>,
    options: RunOptions,
) -> Result<()>
where
    W: io::Write,
{
    let RunOptions {
        settings,
        output_format,
        log_level,
    } = options;
    telemetry::initialise_tracing(
        "overdrive",
        terminal_client.stderr_is_terminal(),
        log_level.map(LogLevel::as_level_filter),
    )?;

    let context = crate::cli::CommandContext::new(settings, output_format, terminal_client);
    match command {
        Command::Scan(args) => crate::cli::scan::run(hardware_client, &args, out, &context).await,
        Command::Query(args) => crate::cli::query::run(hardware_client, &args, out, &context).await,
        Command::Drive(args) => crate::cli::drive::run(hardware_client, &args, out, &context).await,
        Command::Listen(args) => {
            crate::cli::listen::run(hardware_client, &args, out, &context).await
        }
        Command::Track(args) => crate::cli::track::run(&args, out, &context),
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Scan(_args) => "scan",
        Command::Query(_args) => "query",
        Command::Drive(_args) => "drive",
        Command::Listen(_args) => "listen",
        Command::Track(_args) => "track",
    }
}
