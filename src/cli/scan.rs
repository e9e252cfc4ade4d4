use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::instrument;

use crate::hw::HardwareClient;

use super::command::parse_duration;
use super::target::DEFAULT_SCAN_DURATION;
use super::ui::VehicleListView;
use super::{CommandContext, OutputFormat, write_json_line};

/// Arguments for the `scan` command.
#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// How long to scan (e.g. `500ms`, `3s`).
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    duration: Duration,
}

impl ScanArgs {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Default for ScanArgs {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_DURATION)
    }
}

#[derive(Debug, Serialize)]
struct ScanRecord<'a> {
    adapter: &'a str,
    device_id: &'a str,
    address: &'a str,
    local_name: Option<&'a str>,
    registered_name: Option<&'a str>,
    rssi: Option<i16>,
}

/// Executes the `scan` command.
#[instrument(skip_all, level = "debug", fields(duration = ?args.duration))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &ScanArgs,
    out: &mut W,
    context: &CommandContext<'_>,
) -> Result<()>
where
    W: io::Write,
{
    let vehicles = context
        .spinner()
        .with_spinner("Scanning for vehicles", || {
            client.discover_vehicles(args.duration)
        })
        .await?;

    let settings = context.settings();
    let rows: Vec<_> = vehicles
        .iter()
        .map(|vehicle| {
            let device = vehicle.device();
            let registered = settings
                .vehicle(device)
                .and_then(|registered| registered.name.as_deref());
            (device, registered)
        })
        .collect();

    match context.output_format() {
        OutputFormat::Pretty => {
            let painter = context.painter();
            writeln!(out, "{}", VehicleListView::new(rows, &painter))?;
        }
        OutputFormat::Json => {
            for (device, registered_name) in rows {
                write_json_line(
                    out,
                    &ScanRecord {
                        adapter: device.adapter_name(),
                        device_id: device.device_id(),
                        address: device.address(),
                        local_name: device.local_name(),
                        registered_name,
                        rssi: device.rssi(),
                    },
                )?;
            }
        }
    }
    Ok(())
}
