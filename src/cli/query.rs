use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::hw::HardwareClient;
use crate::vehicle::Vehicle;

use super::target::TargetArgs;
use super::ui::{Table, VehicleView};
use super::{CommandContext, OutputFormat, write_json_line};

/// Arguments for the `query` command.
#[derive(Debug, Clone, Default, Args)]
pub struct QueryArgs {
    #[command(flatten)]
    target: TargetArgs,
}

impl QueryArgs {
    #[must_use]
    pub fn new(target: TargetArgs) -> Self {
        Self { target }
    }
}

/// Answers to the status queries.
#[derive(Debug, Clone, Copy, PartialEq)]
struct VehicleStatus {
    ping: Duration,
    version: u16,
    battery_level: u16,
}

impl VehicleStatus {
    async fn query(vehicle: &Vehicle) -> Result<Self> {
        Ok(Self {
            ping: vehicle.query_ping().await?,
            version: vehicle.query_version().await?,
            battery_level: vehicle.query_battery_level().await?,
        })
    }
}

#[derive(Debug, Serialize)]
struct QueryRecord<'a> {
    device_id: &'a str,
    address: &'a str,
    name: Option<&'a str>,
    ping_ms: f64,
    version: u16,
    battery_level: u16,
}

/// Executes the `query` command.
#[instrument(skip_all, level = "debug")]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &QueryArgs,
    out: &mut W,
    context: &CommandContext<'_>,
) -> Result<()>
where
    W: io::Write,
{
    let vehicle = context.connector(client, &args.target).connect_first().await?;
    let status = VehicleStatus::query(&vehicle).await;
    if let Err(error) = vehicle.disconnect().await {
        debug!(%error, "failed to disconnect cleanly");
    }
    let status = status?;

    match context.output_format() {
        OutputFormat::Pretty => {
            let painter = context.painter();
            let table = Table::key_value(
                &painter,
                vec![
                    (
                        "ping",
                        painter.value(humantime::format_duration(status.ping).to_string()),
                    ),
                    ("version", painter.value(format!("{:#06x}", status.version))),
                    ("battery_level", painter.value(status.battery_level.to_string())),
                ],
            );
            writeln!(out, "{}", painter.heading("Vehicle:"))?;
            writeln!(
                out,
                "{}",
                VehicleView::new(vehicle.device(), vehicle.setup().name(), &painter)
            )?;
            writeln!(out)?;
            writeln!(out, "{}", painter.heading("Status:"))?;
            writeln!(out, "{table}")?;
        }
        OutputFormat::Json => {
            write_json_line(
                out,
                &QueryRecord {
                    device_id: vehicle.id(),
                    address: vehicle.address(),
                    name: vehicle.name(),
                    ping_ms: status.ping.as_secs_f64() * 1_000.0,
                    version: status.version,
                    battery_level: status.battery_level,
                },
            )?;
        }
    }
    Ok(())
}
