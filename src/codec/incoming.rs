use serde::Serialize;
use tracing::instrument;

use super::MessageId;
use super::frame::{MessageDecodeError, PayloadReader, RawFrame};

const PARSE_FLAGS_MASK_NUM_BITS: u8 = 0x0f;
const PARSE_FLAGS_MASK_REVERSE_DRIVING: u8 = 0x20;
const PARSE_FLAGS_MASK_REVERSE_PARSING: u8 = 0x40;

/// Localisation report sent each time the vehicle reads a location code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionUpdate {
    /// Piece-local location code.
    pub location: u8,
    /// Id of the piece the vehicle is on.
    pub piece: u8,
    /// Offset from the road centre in mm.
    pub offset: f32,
    /// Current speed in mm/s.
    pub speed: u16,
    pub parsing_flags: u8,
    pub last_received_lane_change: u8,
    pub last_executed_lane_change: u8,
    pub last_desired_horizontal_speed: u16,
    pub last_desired_speed: u16,
}

impl PositionUpdate {
    const PAYLOAD_LEN: usize = 15;

    fn read(reader: &mut PayloadReader<'_>) -> Self {
        Self {
            location: reader.u8(),
            piece: reader.u8(),
            offset: reader.f32(),
            speed: reader.u16(),
            parsing_flags: reader.u8(),
            last_received_lane_change: reader.u8(),
            last_executed_lane_change: reader.u8(),
            last_desired_horizontal_speed: reader.u16(),
            last_desired_speed: reader.u16(),
        }
    }

    /// Whether the vehicle is travelling clockwise around the ring.
    #[must_use]
    pub fn clockwise(&self) -> bool {
        self.parsing_flags & PARSE_FLAGS_MASK_REVERSE_PARSING != 0
    }

    /// Whether the vehicle is driving backwards.
    #[must_use]
    pub fn reverse_driving(&self) -> bool {
        self.parsing_flags & PARSE_FLAGS_MASK_REVERSE_DRIVING != 0
    }

    /// Number of code bits read for this location.
    #[must_use]
    pub fn code_bits(&self) -> u8 {
        self.parsing_flags & PARSE_FLAGS_MASK_NUM_BITS
    }
}

/// Report sent when the vehicle crosses from one piece to the next.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionUpdate {
    pub piece_index: i8,
    pub previous_piece_index: i8,
    pub offset: f32,
    pub last_received_lane_change: u8,
    pub last_executed_lane_change: u8,
    pub last_desired_horizontal_speed: u16,
    pub last_desired_speed: u16,
    pub uphill_counter: u8,
    pub downhill_counter: u8,
    /// Left wheel distance travelled on the previous piece, in cm.
    pub left_wheel_distance: u8,
    /// Right wheel distance travelled on the previous piece, in cm.
    pub right_wheel_distance: u8,
}

impl TransitionUpdate {
    const PAYLOAD_LEN: usize = 16;

    fn read(reader: &mut PayloadReader<'_>) -> Self {
        Self {
            piece_index: reader.i8(),
            previous_piece_index: reader.i8(),
            offset: reader.f32(),
            last_received_lane_change: reader.u8(),
            last_executed_lane_change: reader.u8(),
            last_desired_horizontal_speed: reader.u16(),
            last_desired_speed: reader.u16(),
            uphill_counter: reader.u8(),
            downhill_counter: reader.u8(),
            left_wheel_distance: reader.u8(),
            right_wheel_distance: reader.u8(),
        }
    }
}

/// Report sent when the vehicle crosses an intersection code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntersectionUpdate {
    pub piece_index: i8,
    pub offset: f32,
    pub intersection_code: u8,
    pub exiting: bool,
    pub mm_since_last_transition: u16,
    pub mm_since_last_intersection: u16,
}

impl IntersectionUpdate {
    const PAYLOAD_LEN: usize = 11;

    fn read(reader: &mut PayloadReader<'_>) -> Self {
        Self {
            piece_index: reader.i8(),
            offset: reader.f32(),
            intersection_code: reader.u8(),
            exiting: reader.u8() != 0,
            mm_since_last_transition: reader.u16(),
            mm_since_last_intersection: reader.u16(),
        }
    }
}

/// Report of the offset the vehicle settled on after a lane change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OffsetUpdate {
    pub offset: f32,
    pub lane_change: u8,
}

impl OffsetUpdate {
    const PAYLOAD_LEN: usize = 5;

    fn read(reader: &mut PayloadReader<'_>) -> Self {
        Self {
            offset: reader.f32(),
            lane_change: reader.u8(),
        }
    }
}

/// Messages sent from a vehicle to the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "message", content = "fields", rename_all = "snake_case")]
pub enum Telemetry {
    PositionUpdate(PositionUpdate),
    TransitionUpdate(TransitionUpdate),
    IntersectionUpdate(IntersectionUpdate),
    VehicleDelocalized,
    OffsetUpdate(OffsetUpdate),
    PingResponse,
    /// Firmware version.
    VersionResponse(u16),
    /// Battery level as reported by the firmware.
    BatteryLevelResponse(u16),
}

impl Telemetry {
    /// Decodes one received frame.
    ///
    /// Returns `Ok(None)` for ids that are not controller-bound messages.
    ///
    /// ```
    /// use overdrive::Telemetry;
    ///
    /// let decoded = Telemetry::decode(&[0x03, 0x19, 0x2e, 0x2f])?;
    /// assert_eq!(Some(Telemetry::VersionResponse(0x2f2e)), decoded);
    /// assert_eq!(None, Telemetry::decode(&[0x01, 0x7f])?);
    /// # Ok::<(), overdrive::MessageDecodeError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error when the frame has no header, or when a known message
    /// is shorter than its layout.
    #[instrument(skip(bytes), level = "trace", fields(frame_len = bytes.len()))]
    pub fn decode(bytes: &[u8]) -> Result<Option<Self>, MessageDecodeError> {
        let frame = RawFrame::parse(bytes)?;
        let Some(message_id) = MessageId::from_byte(frame.message_id()) else {
            return Ok(None);
        };

        let reader = |expected| PayloadReader::new(&frame, message_id, expected);
        let message = match message_id {
            MessageId::PositionUpdate => {
                Self::PositionUpdate(PositionUpdate::read(&mut reader(PositionUpdate::PAYLOAD_LEN)?))
            }
            MessageId::TransitionUpdate => Self::TransitionUpdate(TransitionUpdate::read(
                &mut reader(TransitionUpdate::PAYLOAD_LEN)?,
            )),
            MessageId::IntersectionUpdate => Self::IntersectionUpdate(IntersectionUpdate::read(
                &mut reader(IntersectionUpdate::PAYLOAD_LEN)?,
            )),
            MessageId::OffsetUpdate => {
                Self::OffsetUpdate(OffsetUpdate::read(&mut reader(OffsetUpdate::PAYLOAD_LEN)?))
            }
            MessageId::VehicleDelocalized => Self::VehicleDelocalized,
            MessageId::PingResponse => Self::PingResponse,
            MessageId::VersionResponse => Self::VersionResponse(reader(2)?.u16()),
            MessageId::BatteryLevelResponse => Self::BatteryLevelResponse(reader(2)?.u16()),
            MessageId::PingRequest
            | MessageId::VersionRequest
            | MessageId::BatteryLevelRequest
            | MessageId::SetLights
            | MessageId::SetSpeed
            | MessageId::ChangeLane
            | MessageId::CancelLaneChange
            | MessageId::SetOffset
            | MessageId::Turn
            | MessageId::SdkMode => return Ok(None),
        };

        Ok(Some(message))
    }

    /// Wire id of this message.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::PositionUpdate(_) => MessageId::PositionUpdate,
            Self::TransitionUpdate(_) => MessageId::TransitionUpdate,
            Self::IntersectionUpdate(_) => MessageId::IntersectionUpdate,
            Self::VehicleDelocalized => MessageId::VehicleDelocalized,
            Self::OffsetUpdate(_) => MessageId::OffsetUpdate,
            Self::PingResponse => MessageId::PingResponse,
            Self::VersionResponse(_) => MessageId::VersionResponse,
            Self::BatteryLevelResponse(_) => MessageId::BatteryLevelResponse,
        }
    }
}
