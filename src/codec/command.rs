use bon::Builder;

use super::MessageId;
use super::frame::FrameBuilder;
use super::lights::SetLights;

const SDK_OPTION_OVERRIDE_LOCALIZATION: u8 = 0x01;

/// `SetSpeed` command.
///
/// ```
/// use overdrive::SetSpeed;
///
/// let command = SetSpeed::builder().speed(400).acceleration(200).build();
/// assert_eq!(false, command.limit);
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Builder)]
pub struct SetSpeed {
    /// Target speed in mm/s.
    pub speed: u16,
    /// Acceleration in mm/s².
    #[builder(default = 250)]
    pub acceleration: u16,
    /// Whether the vehicle should respect per-piece speed limits.
    #[builder(default)]
    pub limit: bool,
}

/// `ChangeLane` command.
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
pub struct ChangeLane {
    /// Target offset from the road centre in mm.
    pub offset: f32,
    /// Horizontal speed in mm/s.
    #[builder(default = 300)]
    pub speed: u16,
    /// Horizontal acceleration in mm/s².
    #[builder(default = 250)]
    pub acceleration: u16,
    #[builder(default)]
    pub hop_intent: u8,
    #[builder(default)]
    pub tag: u8,
}

/// Turn manoeuvre requested by a `Turn` command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TurnType {
    Left,
    Right,
    UTurn,
    UTurnJump,
}

impl TurnType {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Left => 1,
            Self::Right => 2,
            Self::UTurn => 3,
            Self::UTurnJump => 4,
        }
    }
}

/// Commands sent from the controller to a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetSpeed(SetSpeed),
    /// Offset from the road centre in mm.
    SetOffset(f32),
    ChangeLane(ChangeLane),
    CancelLaneChange,
    Turn(TurnType),
    /// Enables or disables externally driven (SDK) mode.
    SdkMode(bool),
    SetLights(SetLights),
    PingRequest,
    VersionRequest,
    BatteryLevelRequest,
}

impl Command {
    /// Wire id of this command.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::SetSpeed(_) => MessageId::SetSpeed,
            Self::SetOffset(_) => MessageId::SetOffset,
            Self::ChangeLane(_) => MessageId::ChangeLane,
            Self::CancelLaneChange => MessageId::CancelLaneChange,
            Self::Turn(_) => MessageId::Turn,
            Self::SdkMode(_) => MessageId::SdkMode,
            Self::SetLights(_) => MessageId::SetLights,
            Self::PingRequest => MessageId::PingRequest,
            Self::VersionRequest => MessageId::VersionRequest,
            Self::BatteryLevelRequest => MessageId::BatteryLevelRequest,
        }
    }

    /// Encodes the complete frame: length byte, id byte, then the payload.
    ///
    /// ```
    /// use overdrive::{SetSpeed, VehicleCommand as Command};
    ///
    /// let frame = Command::SetSpeed(SetSpeed::builder().speed(400).acceleration(200).build())
    ///     .encode();
    /// assert_eq!(vec![0x06, 0x24, 0x90, 0x01, 0xc8, 0x00, 0x00], frame);
    /// ```
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let id = self.message_id();
        match self {
            Self::SetSpeed(command) => FrameBuilder::new(id, 5)
                .u16(command.speed)
                .u16(command.acceleration)
                .u8(u8::from(command.limit))
                .finish(),
            Self::SetOffset(offset) => FrameBuilder::new(id, 4).f32(*offset).finish(),
            Self::ChangeLane(command) => FrameBuilder::new(id, 10)
                .u16(command.speed)
                .u16(command.acceleration)
                .f32(command.offset)
                .u8(command.hop_intent)
                .u8(command.tag)
                .finish(),
            Self::Turn(turn) => FrameBuilder::new(id, 1).u8(turn.as_byte()).finish(),
            Self::SdkMode(on) => FrameBuilder::new(id, 2)
                .u8(u8::from(*on))
                .u8(SDK_OPTION_OVERRIDE_LOCALIZATION)
                .finish(),
            Self::SetLights(lights) => lights.encode(),
            Self::CancelLaneChange
            | Self::PingRequest
            | Self::VersionRequest
            | Self::BatteryLevelRequest => FrameBuilder::new(id, 0).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::codec::{LightChannel, LightConfig};

    #[test]
    fn set_speed_places_fields_at_fixed_offsets() {
        let frame = Command::SetSpeed(
            SetSpeed::builder()
                .speed(400)
                .acceleration(200)
                .limit(false)
                .build(),
        )
        .encode();

        assert_eq!(7, frame.len());
        assert_eq!(6, frame[0]);
        assert_eq!(0x24, frame[1]);
        assert_eq!(400, u16::from_le_bytes([frame[2], frame[3]]));
        assert_eq!(200, u16::from_le_bytes([frame[4], frame[5]]));
        assert_eq!(0, frame[6]);
    }

    #[test]
    fn set_offset_encodes_little_endian_float() {
        let frame = Command::SetOffset(68.0).encode();
        let mut expected = vec![0x05, 0x2c];
        expected.extend_from_slice(&68.0_f32.to_le_bytes());
        assert_eq!(expected, frame);
    }

    #[test]
    fn change_lane_uses_default_speed_and_acceleration() {
        let frame = Command::ChangeLane(ChangeLane::builder().offset(-23.0).build()).encode();

        let mut expected = vec![0x0b, 0x25, 0x2c, 0x01, 0xfa, 0x00];
        expected.extend_from_slice(&(-23.0_f32).to_le_bytes());
        expected.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(expected, frame);
    }

    #[test]
    fn change_lane_writes_speed_and_acceleration_before_offset() {
        let command = ChangeLane::builder()
            .offset(1.0)
            .speed(0x0102)
            .acceleration(0x0304)
            .hop_intent(0x05)
            .tag(0x06)
            .build();

        let frame = Command::ChangeLane(command).encode();

        let mut expected = vec![0x0b, 0x25, 0x02, 0x01, 0x04, 0x03];
        expected.extend_from_slice(&1.0_f32.to_le_bytes());
        expected.extend_from_slice(&[0x05, 0x06]);
        assert_eq!(expected, frame);
    }

    #[rstest]
    #[case(TurnType::Left, 1)]
    #[case(TurnType::Right, 2)]
    #[case(TurnType::UTurn, 3)]
    #[case(TurnType::UTurnJump, 4)]
    fn turn_encodes_turn_type(#[case] turn: TurnType, #[case] expected: u8) {
        assert_eq!(vec![0x02, 0x32, expected], Command::Turn(turn).encode());
    }

    #[rstest]
    #[case(true, vec![0x03, 0x90, 0x01, 0x01])]
    #[case(false, vec![0x03, 0x90, 0x00, 0x01])]
    fn sdk_mode_sets_override_flag(#[case] on: bool, #[case] expected: Vec<u8>) {
        assert_eq!(expected, Command::SdkMode(on).encode());
    }

    #[rstest]
    #[case(Command::CancelLaneChange, 0x26)]
    #[case(Command::PingRequest, 0x16)]
    #[case(Command::VersionRequest, 0x18)]
    #[case(Command::BatteryLevelRequest, 0x1a)]
    fn payloadless_commands_are_two_bytes(#[case] command: Command, #[case] id: u8) {
        assert_eq!(vec![0x01, id], command.encode());
    }

    #[test]
    fn frame_length_byte_counts_id_and_payload() {
        let lights = SetLights::new(&[LightConfig::new(LightChannel::Red)])
            .expect("one config should build");
        let commands = [
            Command::SetSpeed(SetSpeed::builder().speed(1).build()),
            Command::SetOffset(0.0),
            Command::ChangeLane(ChangeLane::builder().offset(0.0).build()),
            Command::Turn(TurnType::Left),
            Command::SdkMode(true),
            Command::SetLights(lights),
        ];

        for command in commands {
            let frame = command.encode();
            assert_eq!(frame.len(), usize::from(frame[0]) + 1, "{command:?}");
            assert_eq!(command.message_id().as_byte(), frame[1]);
        }
    }
}
