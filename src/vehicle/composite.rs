use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, instrument};

use super::session::Vehicle;
use crate::codec::{LightChannel, LightConfig, MessageId, SetSpeed, Telemetry, VehicleMessage};
use crate::error::VehicleError;

/// Speed reduction applied by [`Vehicle::brake`], in mm/s.
pub const DEFAULT_BRAKE_DELTA: u16 = 50;
/// Acceleration used by the composite speed changes, in mm/s².
pub const DEFAULT_COMPOSITE_ACCELERATION: u16 = 300;
const ACCELERATE_THRESHOLD: u16 = 25;

const BRAKE_LIGHTS: [LightConfig; 3] = [
    LightConfig::off(LightChannel::Green),
    LightConfig::off(LightChannel::Blue),
    LightConfig::new(LightChannel::Red),
];
const ACCELERATE_LIGHTS: [LightConfig; 3] = [
    LightConfig::new(LightChannel::Green),
    LightConfig::off(LightChannel::Blue),
    LightConfig::off(LightChannel::Red),
];
const CRUISE_LIGHTS: [LightConfig; 3] = [
    LightConfig::off(LightChannel::Green),
    LightConfig::new(LightChannel::Blue),
    LightConfig::off(LightChannel::Red),
];

impl Vehicle {
    /// Slows down by [`DEFAULT_BRAKE_DELTA`].
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn brake(&self) -> Result<(), VehicleError> {
        self.brake_with(DEFAULT_BRAKE_DELTA, DEFAULT_COMPOSITE_ACCELERATION)
    }

    /// Slows down by `delta` and shows brake lights.
    ///
    /// The cruise lights come back after roughly the time the vehicle needs to
    /// cover 180 mm at the new speed. A vehicle braked to a stop keeps its
    /// brake lights.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    #[instrument(skip(self), level = "debug", fields(device_id = self.id()))]
    pub fn brake_with(&self, delta: u16, acceleration: u16) -> Result<(), VehicleError> {
        let target = self.speed().saturating_sub(delta);
        self.set_speed_with(
            SetSpeed::builder()
                .speed(target)
                .acceleration(acceleration)
                .build(),
        )?;
        self.set_lights(&BRAKE_LIGHTS)?;

        let Some(delay) = brake_light_delay(target) else {
            return Ok(());
        };
        let weak = Arc::downgrade(&self.shared);
        self.spawn_while_linked(async move {
            sleep(delay).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if let Err(error) = (Vehicle { shared }).set_lights(&CRUISE_LIGHTS) {
                debug!(%error, "could not restore cruise lights after braking");
            }
        })
    }

    /// Speeds up to `max` with [`DEFAULT_COMPOSITE_ACCELERATION`].
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn accelerate(&self, max: u16) -> Result<(), VehicleError> {
        self.accelerate_with(max, DEFAULT_COMPOSITE_ACCELERATION)
    }

    /// Changes speed to `max` and shows acceleration lights until position
    /// telemetry reports the target speed.
    ///
    /// Requests within 25 mm/s of the current speed are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    #[instrument(skip(self), level = "debug", fields(device_id = self.id()))]
    pub fn accelerate_with(&self, max: u16, acceleration: u16) -> Result<(), VehicleError> {
        if !self.is_connected() {
            return Err(VehicleError::NotConnected);
        }
        if self.speed().abs_diff(max) < ACCELERATE_THRESHOLD {
            return Ok(());
        }

        let registration = Arc::new(OnceLock::new());
        let weak = Arc::downgrade(&self.shared);
        let slot = Arc::clone(&registration);
        let token = self.add_listener(Some(MessageId::PositionUpdate), move |message| {
            let VehicleMessage::Telemetry(Telemetry::PositionUpdate(update)) = message else {
                return;
            };
            if update.speed < max {
                return;
            }
            let (Some(shared), Some(token)) = (weak.upgrade(), slot.get()) else {
                return;
            };
            if !shared.listeners.remove(*token) {
                return;
            }
            if let Err(error) = (Vehicle { shared }).set_lights(&CRUISE_LIGHTS) {
                debug!(%error, "could not restore cruise lights after accelerating");
            }
        });
        registration.get_or_init(|| token);

        let sent = self
            .set_speed_with(
                SetSpeed::builder()
                    .speed(max)
                    .acceleration(acceleration)
                    .build(),
            )
            .and_then(|()| self.set_lights(&ACCELERATE_LIGHTS));
        if sent.is_err() {
            self.remove_listener(token);
        }
        sent
    }
}

/// Time to cover 180 mm at `speed` mm/s, rounded to whole milliseconds.
fn brake_light_delay(speed: u16) -> Option<Duration> {
    if speed == 0 {
        return None;
    }
    let speed = u64::from(speed);
    Some(Duration::from_millis((180_000 + speed / 2) / speed))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::codec::{Command, SetLights};
    use crate::vehicle::test_support::{
        connected_vehicle, default_config, message_channel, position_frame,
    };

    fn lights(configs: &[LightConfig]) -> VehicleMessage {
        VehicleMessage::Command(Command::SetLights(
            SetLights::new(configs).expect("non-empty lights"),
        ))
    }

    fn speed(speed: u16) -> VehicleMessage {
        VehicleMessage::Command(Command::SetSpeed(
            SetSpeed::builder().speed(speed).acceleration(300).build(),
        ))
    }

    #[rstest]
    #[case(0, None)]
    #[case(180, Some(1_000))]
    #[case(450, Some(400))]
    #[case(700, Some(257))]
    fn brake_light_delay_covers_180_mm(#[case] speed: u16, #[case] expected_ms: Option<u64>) {
        assert_eq!(
            expected_ms.map(Duration::from_millis),
            brake_light_delay(speed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn brake_restores_cruise_lights_after_delay() -> anyhow::Result<()> {
        let (vehicle, fake) = connected_vehicle(default_config()).await?;
        let (_positions, mut positions) =
            message_channel(&vehicle, Some(MessageId::PositionUpdate));
        fake.notify(position_frame(1, 17, 500));
        positions.recv().await;

        let (_commands, mut commands) = message_channel(&vehicle, None);
        vehicle.brake()?;

        assert_eq!(Some(speed(450)), commands.recv().await);
        assert_eq!(Some(lights(&BRAKE_LIGHTS)), commands.recv().await);

        let braked = tokio::time::Instant::now();
        assert_eq!(Some(lights(&CRUISE_LIGHTS)), commands.recv().await);
        assert_eq!(Duration::from_millis(400), braked.elapsed());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn brake_to_standstill_keeps_brake_lights() -> anyhow::Result<()> {
        let (vehicle, _fake) = connected_vehicle(default_config()).await?;
        let (_commands, mut commands) = message_channel(&vehicle, None);

        vehicle.brake()?;
        sleep(Duration::from_secs(5)).await;

        assert_eq!(Ok(speed(0)), commands.try_recv());
        assert_eq!(Ok(lights(&BRAKE_LIGHTS)), commands.try_recv());
        assert!(commands.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn accelerate_disarms_once_target_speed_is_reported() -> anyhow::Result<()> {
        let (vehicle, fake) = connected_vehicle(default_config()).await?;
        let (_commands, mut commands) = message_channel(&vehicle, Some(MessageId::SetLights));
        let baseline = vehicle.listener_count();

        vehicle.accelerate(600)?;
        assert_eq!(baseline + 1, vehicle.listener_count());
        assert_eq!(Some(lights(&ACCELERATE_LIGHTS)), commands.recv().await);

        fake.notify(position_frame(3, 17, 420));
        fake.notify(position_frame(4, 17, 603));
        fake.notify(position_frame(5, 17, 610));

        assert_eq!(Some(lights(&CRUISE_LIGHTS)), commands.recv().await);
        assert_eq!(baseline, vehicle.listener_count());
        let expected_speed = SetSpeed::builder().speed(600).acceleration(300).build();
        assert_eq!(
            Some(&Command::SetSpeed(expected_speed).encode()),
            fake.written().get(4)
        );
        Ok(())
    }

    #[tokio::test]
    async fn accelerate_ignores_small_changes() -> anyhow::Result<()> {
        let (vehicle, fake) = connected_vehicle(default_config()).await?;
        let written = fake.written().len();

        vehicle.accelerate(20)?;

        assert_eq!(written, fake.written().len());
        assert_eq!(1, vehicle.listener_count());
        Ok(())
    }
}
