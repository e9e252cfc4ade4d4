use derive_more::Display;
use strum_macros::EnumString;

/// Number of parallel lanes on every piece.
pub const LANE_COUNT: usize = 16;

/// Id reported by the start sentinel piece.
pub const START_PIECE_ID: u8 = 33;

/// Id reported by the finish sentinel piece.
pub const FINISH_PIECE_ID: u8 = 34;

type LaneTable = [&'static [u8]; LANE_COUNT];

static STRAIGHT_LANES: LaneTable = [
    &[0, 1, 2],
    &[3, 4, 5],
    &[6, 7, 8],
    &[9, 10, 11],
    &[12, 13, 14],
    &[15, 16, 17],
    &[18, 19, 20],
    &[21, 22, 23],
    &[24, 25, 26],
    &[27, 28, 29],
    &[30, 31, 32],
    &[33, 34, 35],
    &[36, 37, 38],
    &[39, 40, 41],
    &[42, 43, 44],
    &[45, 46, 47],
];

// Inner lanes of a curve are shorter and carry one code less.
static CURVE_LANES: LaneTable = [
    &[0, 1],
    &[2, 3],
    &[4, 5],
    &[6, 7],
    &[8, 9],
    &[10, 11],
    &[12, 13],
    &[14, 15],
    &[16, 17],
    &[18, 19, 20],
    &[21, 22, 23],
    &[24, 25, 26],
    &[27, 28, 29],
    &[30, 31, 32],
    &[33, 34, 35],
    &[36, 37, 38],
];

static START_LANES: LaneTable = [
    &[0],
    &[1],
    &[2],
    &[3],
    &[4],
    &[5],
    &[6],
    &[7],
    &[8],
    &[9],
    &[10],
    &[11],
    &[12],
    &[13],
    &[14],
    &[15],
];

static FINISH_LANES: LaneTable = [
    &[0, 1],
    &[2, 3],
    &[4, 5],
    &[6, 7],
    &[8, 9],
    &[10, 11],
    &[12, 13],
    &[14, 15],
    &[16, 17],
    &[18, 19],
    &[20, 21],
    &[22, 23],
    &[24, 25],
    &[26, 27],
    &[28, 29],
    &[30, 31],
];

/// Shape of a track piece.
///
/// Only straights and curves can appear in a layout; start and finish are
/// inserted by [`Track::build`](super::Track::build).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PieceKind {
    #[display("straight")]
    Straight,
    #[display("curve")]
    Curve,
    #[display("start")]
    #[strum(disabled)]
    Start,
    #[display("finish")]
    #[strum(disabled)]
    Finish,
}

impl PieceKind {
    fn lanes(self) -> &'static LaneTable {
        match self {
            Self::Straight => &STRAIGHT_LANES,
            Self::Curve => &CURVE_LANES,
            Self::Start => &START_LANES,
            Self::Finish => &FINISH_LANES,
        }
    }
}

/// One track segment with its 16 lanes of location codes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Piece {
    id: u8,
    kind: PieceKind,
}

impl Piece {
    #[must_use]
    pub const fn straight(id: u8) -> Self {
        Self {
            id,
            kind: PieceKind::Straight,
        }
    }

    #[must_use]
    pub const fn curve(id: u8) -> Self {
        Self {
            id,
            kind: PieceKind::Curve,
        }
    }

    pub(crate) const fn start() -> Self {
        Self {
            id: START_PIECE_ID,
            kind: PieceKind::Start,
        }
    }

    pub(crate) const fn finish() -> Self {
        Self {
            id: FINISH_PIECE_ID,
            kind: PieceKind::Finish,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> PieceKind {
        self.kind
    }

    /// Location codes of lane `index`, in driving order.
    #[must_use]
    pub fn lane(&self, index: usize) -> Option<&'static [u8]> {
        self.kind.lanes().get(index).copied()
    }

    /// All lanes, innermost first.
    pub fn lanes(&self) -> impl ExactSizeIterator<Item = &'static [u8]> + use<> {
        self.kind.lanes().iter().copied()
    }

    /// Index of the lane containing `location`.
    #[must_use]
    pub fn lane_of(&self, location: u8) -> Option<usize> {
        self.lanes().position(|lane| lane.contains(&location))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Piece::straight(1))]
    #[case(Piece::curve(1))]
    #[case(Piece::start())]
    #[case(Piece::finish())]
    fn every_code_resolves_to_its_own_lane(#[case] piece: Piece) {
        assert_eq!(LANE_COUNT, piece.lanes().len());
        for (index, lane) in piece.lanes().enumerate() {
            for code in lane {
                assert_eq!(Some(index), piece.lane_of(*code), "code {code}");
            }
        }
    }

    #[rstest]
    #[case("straight", PieceKind::Straight)]
    #[case("Curve", PieceKind::Curve)]
    fn layout_kinds_parse(#[case] raw: &str, #[case] expected: PieceKind) {
        assert_eq!(Ok(expected), raw.parse::<PieceKind>());
    }

    #[rstest]
    #[case("start")]
    #[case("finish")]
    #[case("ramp")]
    fn sentinel_and_unknown_kinds_do_not_parse(#[case] raw: &str) {
        assert!(raw.parse::<PieceKind>().is_err());
    }

    #[test]
    fn curve_outer_lanes_carry_three_codes() {
        let curve = Piece::curve(7);
        assert_eq!(Some(&[16_u8, 17][..]), curve.lane(8));
        assert_eq!(Some(&[36_u8, 37, 38][..]), curve.lane(15));
        assert_eq!(None, curve.lane(LANE_COUNT));
    }
}
