use std::io;

use anyhow::Result;
use clap::Args;
use tracing::{debug, instrument};

use crate::app::connect_vehicle;
use crate::hw::HardwareClient;

use super::feed::{FeedRecord, TelemetryFeed};
use super::target::TargetArgs;
use super::ui::{StopSummaryView, TelemetryView, VehicleView};
use super::{CommandContext, OutputFormat, write_json_line};

/// Arguments for the `listen` command.
#[derive(Debug, Clone, Default, Args)]
pub struct ListenArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Stop after this many telemetry messages. If omitted, listen until Ctrl+C.
    #[arg(long)]
    max_messages: Option<usize>,
}

impl ListenArgs {
    /// Creates listen arguments with an optional message limit.
    #[must_use]
    pub fn new(max_messages: Option<usize>) -> Self {
        Self {
            target: TargetArgs::default(),
            max_messages,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: TargetArgs) -> Self {
        self.target = target;
        self
    }
}

/// Executes the `listen` command.
///
/// The feed is attached before connecting so frames sent during the
/// handshake are printed too.
#[instrument(skip_all, level = "debug", fields(max_messages = ?args.max_messages))]
pub(crate) async fn run<W>(
    client: Box<dyn HardwareClient>,
    args: &ListenArgs,
    out: &mut W,
    context: &CommandContext<'_>,
) -> Result<()>
where
    W: io::Write,
{
    let vehicle = context.connector(client, &args.target).find_first().await?;
    let mut feed = TelemetryFeed::attach(&vehicle);
    connect_vehicle(&vehicle).await?;

    let painter = context.painter();
    let output_format = context.output_format();
    if output_format == OutputFormat::Pretty {
        writeln!(out, "{}", painter.heading("Connected vehicle:"))?;
        writeln!(
            out,
            "{}",
            VehicleView::new(vehicle.device(), vehicle.setup().name(), &painter)
        )?;
        writeln!(out)?;
    }

    let listened = feed
        .pump(args.max_messages, None, |index, telemetry| {
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
        .await;

    feed.detach(&vehicle);
    if let Err(error) = vehicle.disconnect().await {
        debug!(%error, "failed to disconnect cleanly");
    }
    let (received, stop_reason) = listened?;

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
