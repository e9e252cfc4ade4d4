use std::time::Duration;

use clap::Args;

use super::command::parse_duration;

/// How long commands scan before picking a vehicle.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(3);

/// Selects the vehicle a command talks to.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Id or address prefix of the vehicle to use; the first vehicle found
    /// when omitted.
    #[arg(long, default_value = "")]
    vehicle: String,
    /// How long to scan for vehicles (e.g. `500ms`, `3s`).
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    scan_duration: Duration,
}

impl TargetArgs {
    /// Targets the first vehicle whose id or address starts with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            vehicle: prefix.into(),
            scan_duration: DEFAULT_SCAN_DURATION,
        }
    }

    #[must_use]
    pub fn with_scan_duration(mut self, scan_duration: Duration) -> Self {
        self.scan_duration = scan_duration;
        self
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.vehicle
    }

    pub(crate) fn scan_duration(&self) -> Duration {
        self.scan_duration
    }
}

impl Default for TargetArgs {
    fn default() -> Self {
        Self::new("")
    }
}
