mod piece;
mod topology;

pub use self::piece::{FINISH_PIECE_ID, LANE_COUNT, Piece, PieceKind, START_PIECE_ID};
pub use self::topology::{Coordinate, Track, TrackError, TrackPiece};
