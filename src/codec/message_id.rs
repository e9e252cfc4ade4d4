use strum_macros::{Display, EnumIter};

/// Numeric message ids used by the vehicle protocol.
///
/// Ids below `0x80` are shared between commands (vehicle-bound) and telemetry
/// (controller-bound); the direction is implied by the variant.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MessageId {
    PingRequest,
    PingResponse,
    VersionRequest,
    VersionResponse,
    BatteryLevelRequest,
    BatteryLevelResponse,
    SetLights,
    SetSpeed,
    ChangeLane,
    CancelLaneChange,
    PositionUpdate,
    TransitionUpdate,
    IntersectionUpdate,
    VehicleDelocalized,
    SetOffset,
    OffsetUpdate,
    Turn,
    SdkMode,
}

impl MessageId {
    /// Returns the wire byte for this id.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::PingRequest => 0x16,
            Self::PingResponse => 0x17,
            Self::VersionRequest => 0x18,
            Self::VersionResponse => 0x19,
            Self::BatteryLevelRequest => 0x1a,
            Self::BatteryLevelResponse => 0x1b,
            Self::SetSpeed => 0x24,
            Self::ChangeLane => 0x25,
            Self::CancelLaneChange => 0x26,
            Self::PositionUpdate => 0x27,
            Self::TransitionUpdate => 0x29,
            Self::IntersectionUpdate => 0x2a,
            Self::VehicleDelocalized => 0x2b,
            Self::SetOffset => 0x2c,
            Self::OffsetUpdate => 0x2d,
            Self::Turn => 0x32,
            Self::SetLights => 0x33,
            Self::SdkMode => 0x90,
        }
    }

    /// Maps a wire byte back to an id, if it is known.
    #[must_use]
    pub const fn from_byte(value: u8) -> Option<Self> {
        let id = match value {
            0x16 => Self::PingRequest,
            0x17 => Self::PingResponse,
            0x18 => Self::VersionRequest,
            0x19 => Self::VersionResponse,
            0x1a => Self::BatteryLevelRequest,
            0x1b => Self::BatteryLevelResponse,
            0x24 => Self::SetSpeed,
            0x25 => Self::ChangeLane,
            0x26 => Self::CancelLaneChange,
            0x27 => Self::PositionUpdate,
            0x29 => Self::TransitionUpdate,
            0x2a => Self::IntersectionUpdate,
            0x2b => Self::VehicleDelocalized,
            0x2c => Self::SetOffset,
            0x2d => Self::OffsetUpdate,
            0x32 => Self::Turn,
            0x33 => Self::SetLights,
            0x90 => Self::SdkMode,
            _ => return None,
        };
        Some(id)
    }
}
