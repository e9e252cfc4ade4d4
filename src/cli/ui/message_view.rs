use std::fmt::{self, Display, Formatter};

use crate::cli::feed::StopReason;
use crate::codec::Telemetry;

use super::painter::Painter;

/// Renders one telemetry message as a single line.
pub(crate) struct TelemetryView<'a> {
    index: usize,
    telemetry: &'a Telemetry,
    painter: &'a Painter,
}

impl<'a> TelemetryView<'a> {
    pub(crate) fn new(index: usize, telemetry: &'a Telemetry, painter: &'a Painter) -> Self {
        Self {
            index,
            telemetry,
            painter,
        }
    }
}

impl Display for TelemetryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let index_label = self.painter.muted(format!("[{:04}]", self.index));
        let name = self
            .painter
            .message(self.telemetry.message_id().to_string());
        write!(f, "{index_label} {name}")?;

        let fields = fields(self.telemetry);
        if !fields.is_empty() {
            write!(f, " {fields}")?;
        }
        Ok(())
    }
}

fn fields(telemetry: &Telemetry) -> String {
    match telemetry {
        Telemetry::PositionUpdate(update) => format!(
            "piece={} location={} speed={} offset={:.1} clockwise={}",
            update.piece,
            update.location,
            update.speed,
            update.offset,
            update.clockwise()
        ),
        Telemetry::TransitionUpdate(update) => format!(
            "piece_index={} previous_piece_index={} offset={:.1} uphill={} downhill={}",
            update.piece_index,
            update.previous_piece_index,
            update.offset,
            update.uphill_counter,
            update.downhill_counter
        ),
        Telemetry::IntersectionUpdate(update) => format!(
            "piece_index={} code={} exiting={} offset={:.1}",
            update.piece_index, update.intersection_code, update.exiting, update.offset
        ),
        Telemetry::OffsetUpdate(update) => format!(
            "offset={:.1} lane_change={}",
            update.offset, update.lane_change
        ),
        Telemetry::VersionResponse(version) => format!("version={version:#06x}"),
        Telemetry::BatteryLevelResponse(level) => format!("level={level}"),
        Telemetry::VehicleDelocalized | Telemetry::PingResponse => String::new(),
    }
}

/// Renders the line printed when a telemetry loop ends.
pub(crate) struct StopSummaryView<'a> {
    stop_reason: StopReason,
    received: usize,
    painter: &'a Painter,
}

impl<'a> StopSummaryView<'a> {
    pub(crate) fn new(stop_reason: StopReason, received: usize, painter: &'a Painter) -> Self {
        Self {
            stop_reason,
            received,
            painter,
        }
    }
}

impl Display for StopSummaryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let stop_reason = match self.stop_reason {
            StopReason::ReachedLimit(_) | StopReason::Elapsed => {
                self.painter.success(self.stop_reason.to_string())
            }
            StopReason::Interrupted => self.painter.warning(self.stop_reason.to_string()),
        };
        write!(
            f,
            "{} {} {}",
            self.painter.heading("Stopped:"),
            stop_reason,
            self.painter
                .value(format!("- received {} message(s)", self.received))
        )
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use rstest::rstest;

    use super::*;
    use crate::codec::{OffsetUpdate, PositionUpdate};

    fn position() -> Telemetry {
        Telemetry::PositionUpdate(PositionUpdate {
            location: 3,
            piece: 17,
            offset: -68.0,
            speed: 512,
            parsing_flags: 0x47,
            last_received_lane_change: 0,
            last_executed_lane_change: 0,
            last_desired_horizontal_speed: 0,
            last_desired_speed: 500,
        })
    }

    #[test]
    fn position_update_line_lists_fields() {
        let painter = Painter::new(false);
        let telemetry = position();
        assert_snapshot!(
            TelemetryView::new(42, &telemetry, &painter).to_string(),
            @"[0042] position_update piece=17 location=3 speed=512 offset=-68.0 clockwise=true"
        );
    }

    #[test]
    fn version_is_rendered_as_hex() {
        let painter = Painter::new(false);
        let telemetry = Telemetry::VersionResponse(0x2e2f);
        assert_snapshot!(
            TelemetryView::new(1, &telemetry, &painter).to_string(),
            @"[0001] version_response version=0x2e2f"
        );
    }

    #[rstest]
    #[case::delocalized(Telemetry::VehicleDelocalized, "[0007] vehicle_delocalized")]
    #[case::offset(
        Telemetry::OffsetUpdate(OffsetUpdate { offset: 23.5, lane_change: 2 }),
        "[0007] offset_update offset=23.5 lane_change=2"
    )]
    fn telemetry_line_renders(#[case] telemetry: Telemetry, #[case] expected: &str) {
        let painter = Painter::new(false);
        pretty_assertions::assert_eq!(
            expected,
            TelemetryView::new(7, &telemetry, &painter).to_string()
        );
    }

    #[rstest]
    #[case::reached_limit(StopReason::ReachedLimit(10), "Stopped: reached limit (10) - received 10 message(s)")]
    #[case::elapsed(StopReason::Elapsed, "Stopped: duration elapsed - received 10 message(s)")]
    #[case::interrupted(StopReason::Interrupted, "Stopped: interrupted - received 10 message(s)")]
    fn summary_renders_stop_reason(#[case] stop_reason: StopReason, #[case] expected: &str) {
        let painter = Painter::new(false);
        pretty_assertions::assert_eq!(
            expected,
            StopSummaryView::new(stop_reason, 10, &painter).to_string()
        );
    }
}
