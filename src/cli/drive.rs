use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::{debug, info, instrument};

use crate::hw::HardwareClient;
use crate::vehicle::{DEFAULT_COMPOSITE_ACCELERATION, Vehicle};

use super::command::parse_duration;
use super::feed::{FeedRecord, TelemetryFeed};
use super::target::TargetArgs;
use super::ui::{StopSummaryView, TelemetryView};
use super::{CommandContext, OutputFormat, write_json_line};

const DEFAULT_DRIVE_SPEED: u16 = 500;
const DEFAULT_DRIVE_DURATION: Duration = Duration::from_secs(5);

/// Arguments for the `drive` command.
#[derive(Debug, Clone, Args)]
pub struct DriveArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Target speed in mm/s.
    #[arg(long, default_value_t = DEFAULT_DRIVE_SPEED)]
    speed: u16,
    /// Acceleration in mm/s² used to speed up and to stop.
    #[arg(long, default_value_t = DEFAULT_COMPOSITE_ACCELERATION)]
    acceleration: u16,
    /// Lane offset from the road centre to change to, in mm.
    #[arg(long, allow_hyphen_values = true)]
    offset: Option<f32>,
    /// How long to drive before stopping (e.g. `10s`).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    duration: Duration,
}

impl DriveArgs {
    #[must_use]
    pub fn new(target: TargetArgs, speed: u16) -> Self {
        Self {
            target,
            speed,
            acceleration: DEFAULT_COMPOSITE_ACCELERATION,
            offset: None,
            duration: DEFAULT_DRIVE_DURATION,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Executes the `drive` command.
#[instrument(skip_all, level = "debug", fields(speed = args.speed, duration = ?args.duration))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &DriveArgs,
    out: &mut W,
    context: &CommandContext<'_>,
) -> Result<()>
where
    W: io::Write,
{
    let vehicle = context.connector(client, &args.target).connect_first().await?;
    let mut feed = TelemetryFeed::attach(&vehicle);
    let painter = context.painter();
    let output_format = context.output_format();

    let driven = async {
        start(&vehicle, args)?;
        feed.pump(None, Some(args.duration), |index, telemetry| {
            match output_format {
                OutputFormat::Pretty => {
                    writeln!(out, "{}", TelemetryView::new(index, telemetry, &painter))?;
                }
                OutputFormat::Json => {
                    write_json_line(&mut *out, &FeedRecord::Telemetry { index, telemetry })?;
                }
            }
            Ok(())
        })
        .await
    }
    .await;

    if let Err(error) = vehicle.brake_with(u16::MAX, args.acceleration) {
        debug!(%error, "failed to stop the vehicle");
    }
    feed.detach(&vehicle);
    if let Err(error) = vehicle.disconnect().await {
        debug!(%error, "failed to disconnect cleanly");
    }
    let (received, stop_reason) = driven?;
    info!(received, %stop_reason, "drive finished");

    match output_format {
        OutputFormat::Pretty => {
            writeln!(out)?;
            writeln!(out, "{}", StopSummaryView::new(stop_reason, received, &painter))?;
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &FeedRecord::Summary {
                    stopped: stop_reason.label(),
                    received,
                },
            )?;
        }
    }
    Ok(())
}

fn start(vehicle: &Vehicle, args: &DriveArgs) -> Result<()> {
    if let Some(offset) = args.offset {
        vehicle.change_lane(offset)?;
    }
    vehicle.accelerate_with(args.speed, args.acceleration)?;
    Ok(())
}
