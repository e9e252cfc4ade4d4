use std::fmt::{self, Display, Formatter};

use crate::track::Coordinate;

use super::painter::Painter;
use super::table::Table;

/// Renders a lane's transition table.
pub(crate) struct TransitionView<'a> {
    lane: usize,
    transitions: &'a [(Coordinate, Coordinate)],
    painter: &'a Painter,
}

impl<'a> TransitionView<'a> {
    pub(crate) fn new(
        lane: usize,
        transitions: &'a [(Coordinate, Coordinate)],
        painter: &'a Painter,
    ) -> Self {
        Self {
            lane,
            transitions,
            painter,
        }
    }
}

impl Display for TransitionView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let rows = self
            .transitions
            .iter()
            .enumerate()
            .map(|(index, (from, to))| {
                let changes_piece = from.piece != to.piece;
                let to = to.to_string();
                vec![
                    self.painter.muted((index + 1).to_string()),
                    from.to_string(),
                    if changes_piece {
                        self.painter.value(to)
                    } else {
                        to
                    },
                ]
            });
        let table = Table::grid(["#", "from", "to"], rows);
        write!(
            f,
            "{}",
            self.painter
                .heading(format!("Lane {} transitions:", self.lane))
        )?;
        write!(f, "\n{table}")
    }
}
