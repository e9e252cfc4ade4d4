mod command;
mod frame;
mod incoming;
mod lights;
mod message_id;

use derive_more::From;

pub use self::command::{ChangeLane, Command, SetSpeed, TurnType};
pub(crate) use self::frame::{FrameBuilder, FrameHex};
pub use self::frame::{MessageDecodeError, RawFrame};
pub use self::incoming::{
    IntersectionUpdate, OffsetUpdate, PositionUpdate, Telemetry, TransitionUpdate,
};
pub use self::lights::{
    LightChannel, LightConfig, LightEffect, LightsError, MAX_LIGHT_CONFIGS, MAX_LIGHT_INTENSITY,
    SetLights,
};
pub use self::message_id::MessageId;

/// Any message observed on a vehicle session, in either direction.
///
/// Listeners receive commands after they are written and telemetry after it is
/// decoded.
#[derive(Debug, Clone, PartialEq, From)]
pub enum VehicleMessage {
    Command(Command),
    Telemetry(Telemetry),
}

impl VehicleMessage {
    /// Wire id of the wrapped message.
    #[must_use]
    pub fn message_id(&self) -> MessageId {
        match self {
            Self::Command(command) => command.message_id(),
            Self::Telemetry(telemetry) => telemetry.message_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn message_id_follows_wrapped_direction() {
        let sent = VehicleMessage::from(Command::PingRequest);
        let received = VehicleMessage::from(Telemetry::PingResponse);

        assert_eq!(MessageId::PingRequest, sent.message_id());
        assert_eq!(MessageId::PingResponse, received.message_id());
    }
}
