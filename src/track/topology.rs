use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use super::piece::{LANE_COUNT, Piece};

/// Errors returned while building or querying a track.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TrackError {
    /// A track needs at least one piece between start and finish.
    #[error("track layout has no pieces")]
    EmptyLayout,
    #[error("no piece with id {id} on this track")]
    PieceNotFound { id: u8 },
    #[error("piece {piece_id} has no lane containing location {location}")]
    LaneNotFound { piece_id: u8, location: u8 },
    #[error("lane {lane} does not exist; pieces have {LANE_COUNT} lanes")]
    InvalidLane { lane: usize },
    #[error("unknown piece kind `{kind}`; expected `straight` or `curve`")]
    UnknownPieceKind { kind: String },
}

/// A position on the track: the piece id and a location code on that piece.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub struct Coordinate {
    pub piece: u8,
    pub location: u8,
}

impl Coordinate {
    #[must_use]
    pub const fn new(piece: u8, location: u8) -> Self {
        Self { piece, location }
    }
}

impl From<(u8, u8)> for Coordinate {
    fn from((piece, location): (u8, u8)) -> Self {
        Self::new(piece, location)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.piece, self.location)
    }
}

/// A piece placed on the ring, with links to its neighbours.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TrackPiece {
    piece: Piece,
    index: usize,
    next: usize,
    prev: usize,
}

impl TrackPiece {
    #[must_use]
    pub fn piece(&self) -> &Piece {
        &self.piece
    }

    #[must_use]
    pub fn id(&self) -> u8 {
        self.piece.id()
    }

    /// Position on the ring; the start sentinel is at `0`.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn next_index(&self) -> usize {
        self.next
    }

    #[must_use]
    pub fn prev_index(&self) -> usize {
        self.prev
    }
}

/// Closed ring of pieces: start, the layout pieces in order, then finish.
///
/// The ring is built once and never mutated, so a `Track` can be shared
/// freely between readers.
///
/// ```
/// use overdrive::{Piece, Track};
///
/// let track = Track::build([Piece::straight(10), Piece::curve(11)])?;
/// assert_eq!(4, track.len());
/// assert_eq!(1, track.find_lane(10, 4)?);
/// # Ok::<(), overdrive::TrackError>(())
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Track {
    pieces: Vec<TrackPiece>,
}

impl Track {
    /// Wires `pieces` into a ring between the start and finish sentinels.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::EmptyLayout`] when `pieces` is empty.
    #[instrument(skip(pieces), level = "debug")]
    pub fn build(pieces: impl IntoIterator<Item = Piece>) -> Result<Self, TrackError> {
        let layout: Vec<Piece> = pieces.into_iter().collect();
        if layout.is_empty() {
            return Err(TrackError::EmptyLayout);
        }

        let ring: Vec<Piece> = std::iter::once(Piece::start())
            .chain(layout)
            .chain(std::iter::once(Piece::finish()))
            .collect();
        let len = ring.len();
        let pieces = ring
            .into_iter()
            .enumerate()
            .map(|(index, piece)| TrackPiece {
                piece,
                index,
                next: (index + 1) % len,
                prev: (index + len - 1) % len,
            })
            .collect();

        Ok(Self { pieces })
    }

    /// Number of pieces on the ring, sentinels included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    /// Always `false`; a built track holds at least three pieces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    #[must_use]
    pub fn start(&self) -> &TrackPiece {
        &self.pieces[0]
    }

    #[must_use]
    pub fn finish(&self) -> &TrackPiece {
        &self.pieces[self.pieces.len() - 1]
    }

    #[must_use]
    pub fn next(&self, piece: &TrackPiece) -> &TrackPiece {
        &self.pieces[piece.next]
    }

    #[must_use]
    pub fn prev(&self, piece: &TrackPiece) -> &TrackPiece {
        &self.pieces[piece.prev]
    }

    /// Pieces in ring order, from start to finish, each exactly once.
    pub fn pieces(&self) -> impl Iterator<Item = &TrackPiece> {
        std::iter::successors(Some(self.start()), |piece| Some(self.next(piece)))
            .take(self.pieces.len())
    }

    /// First piece in ring order carrying `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::PieceNotFound`] when no piece has that id.
    pub fn find_piece(&self, id: u8) -> Result<&TrackPiece, TrackError> {
        self.pieces()
            .find(|piece| piece.id() == id)
            .ok_or(TrackError::PieceNotFound { id })
    }

    /// Every piece carrying `id`, in ring order.
    #[must_use]
    pub fn find_pieces(&self, id: u8) -> Vec<&TrackPiece> {
        self.pieces().filter(|piece| piece.id() == id).collect()
    }

    pub fn each_piece(&self, mut visit: impl FnMut(&TrackPiece)) {
        self.pieces().for_each(|piece| visit(piece));
    }

    /// Visits `(piece, lane)` for every lane, lane-major: all pieces on lane 0,
    /// then all pieces on lane 1, through lane 15.
    pub fn each_lane_on_piece(&self, mut visit: impl FnMut(&TrackPiece, &[u8])) {
        for lane in 0..LANE_COUNT {
            for piece in self.pieces() {
                if let Some(codes) = piece.piece().lane(lane) {
                    visit(piece, codes);
                }
            }
        }
    }

    /// Lane index of `location` on the first piece carrying `piece_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::PieceNotFound`] for an unknown piece and
    /// [`TrackError::LaneNotFound`] when no lane of that piece has the code.
    pub fn find_lane(&self, piece_id: u8, location: u8) -> Result<usize, TrackError> {
        self.find_piece(piece_id)?
            .piece()
            .lane_of(location)
            .ok_or(TrackError::LaneNotFound { piece_id, location })
    }

    /// Coordinates met when driving one lap on `lane`, starting at start.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::InvalidLane`] when `lane` is not below 16.
    pub fn lap(&self, lane: usize) -> Result<Vec<Coordinate>, TrackError> {
        if lane >= LANE_COUNT {
            return Err(TrackError::InvalidLane { lane });
        }

        Ok(self
            .pieces()
            .flat_map(|piece| {
                let id = piece.id();
                piece
                    .piece()
                    .lane(lane)
                    .unwrap_or_default()
                    .iter()
                    .map(move |location| Coordinate::new(id, *location))
            })
            .collect())
    }

    /// Visits every adjacent coordinate pair while driving on `lane` from
    /// `start` until `end`.
    ///
    /// When `end` equals `start` the walk covers one full lap and closes back
    /// on `start`. A `start` that is not on the lane begins the walk at the
    /// start sentinel; an `end` that is never reached stops the walk after one
    /// lap.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::InvalidLane`] when `lane` is not below 16.
    #[instrument(skip(self, visit), level = "debug")]
    pub fn each_transition(
        &self,
        mut visit: impl FnMut(Coordinate, Coordinate),
        lane: usize,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<(), TrackError> {
        let lap = self.lap(lane)?;
        let len = lap.len();
        let first = lap
            .iter()
            .position(|coordinate| *coordinate == start)
            .unwrap_or_default();

        for step in 0..len {
            let from = lap[(first + step) % len];
            let to = lap[(first + step + 1) % len];
            visit(from, to);
            if end != start && to == end {
                break;
            }
        }

        Ok(())
    }

    /// Collects [`Track::each_transition`] into a calibration table.
    ///
    /// # Errors
    ///
    /// Returns [`TrackError::InvalidLane`] when `lane` is not below 16.
    pub fn transitions(
        &self,
        lane: usize,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Vec<(Coordinate, Coordinate)>, TrackError> {
        let mut table = Vec::new();
        self.each_transition(|from, to| table.push((from, to)), lane, start, end)?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::track::{FINISH_PIECE_ID, START_PIECE_ID};

    #[fixture]
    fn mixed_track() -> Track {
        Track::build([
            Piece::curve(0),
            Piece::curve(1),
            Piece::straight(2),
            Piece::curve(3),
            Piece::curve(4),
        ])
        .expect("layout is not empty")
    }

    #[fixture]
    fn repeated_straights() -> Track {
        Track::build([
            Piece::straight(10),
            Piece::straight(10),
            Piece::straight(10),
            Piece::straight(11),
        ])
        .expect("layout is not empty")
    }

    #[test]
    fn build_rejects_empty_layout() {
        assert_matches!(Track::build([]), Err(TrackError::EmptyLayout));
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[case(40)]
    fn ring_closes_after_every_piece(#[case] count: u8) {
        let track = Track::build((0..count).map(Piece::straight)).expect("layout is not empty");
        let expected = usize::from(count) + 2;

        let mut visited = 0;
        track.each_piece(|_| visited += 1);
        assert_eq!(expected, visited);

        let mut current = track.start();
        for _ in 0..expected {
            current = track.next(current);
        }
        assert_eq!(track.start(), current);
        assert_eq!(track.finish(), track.prev(track.start()));
    }

    #[rstest]
    fn build_keeps_layout_order_between_sentinels(mixed_track: Track) {
        let ids: Vec<u8> = mixed_track.pieces().map(TrackPiece::id).collect();
        assert_eq!(vec![START_PIECE_ID, 0, 1, 2, 3, 4, FINISH_PIECE_ID], ids);
    }

    #[rstest]
    fn find_pieces_returns_every_match(repeated_straights: Track) {
        assert_eq!(3, repeated_straights.find_pieces(10).len());
        assert_eq!(1, repeated_straights.find_pieces(11).len());
        assert_eq!(0, repeated_straights.find_pieces(0).len());
        assert!(
            repeated_straights
                .find_pieces(10)
                .iter()
                .all(|piece| piece.id() == 10)
        );
        let indices: Vec<usize> = repeated_straights
            .find_pieces(10)
            .iter()
            .map(|piece| piece.index())
            .collect();
        assert_eq!(vec![1, 2, 3], indices);
    }

    #[rstest]
    fn find_piece_returns_first_match_or_fails(repeated_straights: Track) {
        assert_eq!(
            1,
            repeated_straights
                .find_piece(10)
                .expect("piece 10 exists")
                .index()
        );
        assert_eq!(
            11,
            repeated_straights
                .find_piece(11)
                .expect("piece 11 exists")
                .id()
        );
        assert_matches!(
            repeated_straights.find_piece(0),
            Err(TrackError::PieceNotFound { id: 0 })
        );
    }

    #[rstest]
    fn each_lane_on_piece_is_lane_major(mixed_track: Track) {
        let mut visits = Vec::new();
        mixed_track.each_lane_on_piece(|piece, lane| visits.push((piece.index(), lane.to_vec())));

        assert_eq!(LANE_COUNT * mixed_track.len(), visits.len());
        for (position, (index, lane)) in visits.iter().enumerate() {
            let lane_index = position / mixed_track.len();
            assert_eq!(position % mixed_track.len(), *index);
            let expected = mixed_track.pieces[*index]
                .piece()
                .lane(lane_index)
                .expect("lane index is in range");
            assert_eq!(expected, lane.as_slice());
        }
    }

    #[rstest]
    #[case(0, 0, 0)]
    #[case(0, 36, 15)]
    #[case(2, 2, 0)]
    #[case(2, 24, 8)]
    #[case(2, 45, 15)]
    fn find_lane_resolves_location_codes(
        mixed_track: Track,
        #[case] piece_id: u8,
        #[case] location: u8,
        #[case] expected: usize,
    ) {
        assert_eq!(
            expected,
            mixed_track
                .find_lane(piece_id, location)
                .expect("location is on the piece")
        );
    }

    #[rstest]
    fn find_lane_on_start_matches_lane_index(mixed_track: Track) {
        for lane in 0..LANE_COUNT {
            let location = u8::try_from(lane).expect("lane index fits a byte");
            assert_eq!(
                lane,
                mixed_track
                    .find_lane(START_PIECE_ID, location)
                    .expect("start carries one code per lane")
            );
        }
    }

    #[rstest]
    fn find_lane_reports_missing_codes(mixed_track: Track) {
        assert_matches!(
            mixed_track.find_lane(0, 39),
            Err(TrackError::LaneNotFound {
                piece_id: 0,
                location: 39,
            })
        );
        assert_matches!(
            mixed_track.find_lane(9, 0),
            Err(TrackError::PieceNotFound { id: 9 })
        );
    }

    #[test]
    fn each_transition_walks_one_lap_from_start() {
        let track = Track::build([Piece::straight(1), Piece::curve(2)]).expect("layout is not empty");
        let origin = Coordinate::new(17, 0);

        let mut observed = Vec::new();
        track
            .each_transition(|from, to| observed.push((from, to)), 0, origin, origin)
            .expect("lane 0 exists");

        let expected: Vec<(Coordinate, Coordinate)> = [
            ((33, 0), (1, 0)),
            ((1, 0), (1, 1)),
            ((1, 1), (1, 2)),
            ((1, 2), (2, 0)),
            ((2, 0), (2, 1)),
            ((2, 1), (34, 0)),
            ((34, 0), (34, 1)),
            ((34, 1), (33, 0)),
        ]
        .into_iter()
        .map(|(from, to)| (Coordinate::from(from), Coordinate::from(to)))
        .collect();
        assert_eq!(expected, observed);
    }

    #[rstest]
    #[case(0)]
    #[case(8)]
    #[case(15)]
    fn transitions_close_the_lap_without_repeats(mixed_track: Track, #[case] lane: usize) {
        let origin = Coordinate::new(2, u8::try_from(lane * 3).expect("code fits a byte"));
        let table = mixed_track
            .transitions(lane, origin, origin)
            .expect("lane exists");

        assert_eq!(mixed_track.lap(lane).expect("lane exists").len(), table.len());
        assert_eq!(origin, table[0].0);
        assert_eq!(origin, table[table.len() - 1].1);
        for window in table.windows(2) {
            assert_eq!(window[0].1, window[1].0);
        }
        let unique: HashSet<_> = table.iter().collect();
        assert_eq!(table.len(), unique.len());
    }

    #[rstest]
    fn transitions_stop_at_end_coordinate(mixed_track: Track) {
        let table = mixed_track
            .transitions(0, Coordinate::new(1, 0), Coordinate::new(2, 1))
            .expect("lane exists");

        assert_eq!(
            vec![
                (Coordinate::new(1, 0), Coordinate::new(1, 1)),
                (Coordinate::new(1, 1), Coordinate::new(2, 0)),
                (Coordinate::new(2, 0), Coordinate::new(2, 1)),
            ],
            table
        );
    }

    #[rstest]
    fn transitions_reject_unknown_lane(mixed_track: Track) {
        assert_matches!(
            mixed_track.transitions(16, Coordinate::new(0, 0), Coordinate::new(0, 0)),
            Err(TrackError::InvalidLane { lane: 16 })
        );
    }
}
