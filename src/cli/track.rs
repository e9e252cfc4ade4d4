use std::io;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::instrument;

use crate::track::{Coordinate, LANE_COUNT};

use super::ui::TransitionView;
use super::{CommandContext, OutputFormat, write_json_line};

/// Arguments for the `track` command.
#[derive(Debug, Clone, Default, Args)]
pub struct TrackArgs {
    /// Lane to walk, from 0 to 15.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..LANE_COUNT as i64))]
    lane: u8,
}

impl TrackArgs {
    #[must_use]
    pub fn new(lane: u8) -> Self {
        Self { lane }
    }
}

#[derive(Debug, Serialize)]
struct TransitionRecord {
    lane: usize,
    index: usize,
    from: Coordinate,
    to: Coordinate,
}

/// Executes the `track` command.
///
/// Walks one lap of the configured layout from the start piece.
#[instrument(skip_all, level = "debug", fields(lane = args.lane))]
pub(crate) fn run<W>(args: &TrackArgs, out: &mut W, context: &CommandContext<'_>) -> Result<()>
where
    W: io::Write,
{
    let track = context.settings().track()?;
    let lane = usize::from(args.lane);
    let transitions = match track.lap(lane)?.first() {
        Some(start) => track.transitions(lane, *start, *start)?,
        None => Vec::new(),
    };

    match context.output_format() {
        OutputFormat::Pretty => {
            let painter = context.painter();
            writeln!(out, "{}", TransitionView::new(lane, &transitions, &painter))?;
        }
        OutputFormat::Json => {
            for (index, (from, to)) in transitions.into_iter().enumerate() {
                write_json_line(
                    out,
                    &TransitionRecord {
                        lane,
                        index: index + 1,
                        from,
                        to,
                    },
                )?;
            }
        }
    }
    Ok(())
}
