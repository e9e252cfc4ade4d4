pub(crate) mod command;
pub(crate) mod drive;
pub(crate) mod feed;
pub(crate) mod listen;
pub(crate) mod query;
pub(crate) mod scan;
pub(crate) mod target;
pub(crate) mod track;
pub(crate) mod ui;

use std::io;

use serde::Serialize;

use crate::app::VehicleConnector;
use crate::config::Settings;
use crate::hw::HardwareClient;
use crate::terminal::TerminalClient;

pub use self::command::{Args, Command, FakeArgs, LogLevel, OutputFormat};
pub use self::drive::DriveArgs;
pub use self::listen::ListenArgs;
pub use self::query::QueryArgs;
pub use self::scan::ScanArgs;
pub use self::target::{DEFAULT_SCAN_DURATION, TargetArgs};
pub use self::track::TrackArgs;

use self::ui::{Painter, Spinner};

/// Settings and output preferences shared by the command runners.
pub(crate) struct CommandContext<'a> {
    settings: Settings,
    output_format: OutputFormat,
    terminal_client: &'a dyn TerminalClient,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        settings: Settings,
        output_format: OutputFormat,
        terminal_client: &'a dyn TerminalClient,
    ) -> Self {
        Self {
            settings,
            output_format,
            terminal_client,
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub(crate) fn painter(&self) -> Painter {
        Painter::for_output(self.terminal_client, self.output_format)
    }

    pub(crate) fn spinner(&self) -> Spinner {
        Spinner::new(
            self.output_format == OutputFormat::Pretty && self.terminal_client.stderr_is_terminal(),
        )
    }

    pub(crate) fn connector(
        &self,
        hardware_client: Box<dyn HardwareClient>,
        target: &TargetArgs,
    ) -> VehicleConnector {
        VehicleConnector::new(hardware_client, self.settings.clone())
            .with_prefix(target.prefix())
            .with_scan_duration(target.scan_duration())
    }
}

pub(crate) fn write_json_line(out: &mut impl io::Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
