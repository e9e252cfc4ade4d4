use thiserror::Error;

use super::MessageId;
use super::frame::FrameBuilder;

/// Highest intensity the vehicle firmware accepts.
pub const MAX_LIGHT_INTENSITY: u8 = 14;

/// Number of light configurations one `SetLights` frame can carry.
pub const MAX_LIGHT_CONFIGS: usize = 3;

const LIGHT_CONFIG_LEN: u8 = 5;
const SET_LIGHTS_PAYLOAD_LEN: u8 = 1 + LIGHT_CONFIG_LEN * 3;
const DEFAULT_EFFECT_CYCLES: u8 = 1;

/// Errors returned while building light commands.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum LightsError {
    /// A lights command needs at least one channel configuration.
    #[error("a lights command needs at least one light configuration")]
    Empty,
}

/// Light channel addressed by one configuration.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LightChannel {
    Red,
    Tail,
    Blue,
    Green,
    Front,
    Weapon,
}

impl LightChannel {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Red => 0,
            Self::Tail => 1,
            Self::Blue => 2,
            Self::Green => 3,
            Self::Front => 4,
            Self::Weapon => 5,
        }
    }
}

/// Light effect applied to a channel.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LightEffect {
    /// Constant intensity.
    Steady,
    /// Fade between start and end intensity.
    Fade,
    /// Fade up and back down.
    Throb,
    /// Toggle between start and end intensity.
    Flash,
    /// Random flicker.
    Random,
}

impl LightEffect {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Steady => 0,
            Self::Fade => 1,
            Self::Throb => 2,
            Self::Flash => 3,
            Self::Random => 4,
        }
    }
}

/// Pattern for one light channel.
///
/// ```
/// use overdrive::{LightChannel, LightConfig, LightEffect};
///
/// let brake = LightConfig::new(LightChannel::Red).steady();
/// assert_eq!(LightEffect::Steady, brake.effect());
/// assert_eq!(14, brake.end());
///
/// let off = LightConfig::new(LightChannel::Green).steady().with_intensity(0);
/// assert_eq!((0, 0), (off.start(), off.end()));
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LightConfig {
    channel: LightChannel,
    effect: LightEffect,
    start: u8,
    end: u8,
    cycles: u8,
}

impl LightConfig {
    /// Creates a steady, full-intensity pattern on `channel`.
    #[must_use]
    pub const fn new(channel: LightChannel) -> Self {
        Self {
            channel,
            effect: LightEffect::Steady,
            start: MAX_LIGHT_INTENSITY,
            end: MAX_LIGHT_INTENSITY,
            cycles: 0,
        }
    }

    /// Creates a steady pattern switched off.
    #[must_use]
    pub const fn off(channel: LightChannel) -> Self {
        Self::new(channel).with_intensity(0)
    }

    #[must_use]
    pub const fn steady(self) -> Self {
        self.with_effect(LightEffect::Steady)
    }

    #[must_use]
    pub const fn fade(self) -> Self {
        self.with_effect(LightEffect::Fade)
    }

    #[must_use]
    pub const fn throb(self) -> Self {
        self.with_effect(LightEffect::Throb)
    }

    #[must_use]
    pub const fn flash(self) -> Self {
        self.with_effect(LightEffect::Flash)
    }

    #[must_use]
    pub const fn random(self) -> Self {
        self.with_effect(LightEffect::Random)
    }

    /// Sets the target intensity, clamped to [`MAX_LIGHT_INTENSITY`].
    ///
    /// Steady patterns hold the intensity; animated patterns run from zero to it.
    #[must_use]
    pub const fn with_intensity(mut self, intensity: u8) -> Self {
        let intensity = if intensity > MAX_LIGHT_INTENSITY {
            MAX_LIGHT_INTENSITY
        } else {
            intensity
        };
        self.end = intensity;
        self.start = match self.effect {
            LightEffect::Steady => intensity,
            _ => 0,
        };
        self
    }

    /// Overrides the effect cycle count.
    #[must_use]
    pub const fn with_cycles(mut self, cycles: u8) -> Self {
        self.cycles = cycles;
        self
    }

    #[must_use]
    pub const fn channel(&self) -> LightChannel {
        self.channel
    }

    #[must_use]
    pub const fn effect(&self) -> LightEffect {
        self.effect
    }

    #[must_use]
    pub const fn start(&self) -> u8 {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> u8 {
        self.end
    }

    #[must_use]
    pub const fn cycles(&self) -> u8 {
        self.cycles
    }

    const fn with_effect(mut self, effect: LightEffect) -> Self {
        self.effect = effect;
        self.cycles = match effect {
            LightEffect::Steady => 0,
            _ => DEFAULT_EFFECT_CYCLES,
        };
        self.with_intensity(self.end)
    }
}

/// `SetLights` command carrying up to three channel patterns.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SetLights {
    configs: Vec<LightConfig>,
}

impl SetLights {
    /// Builds a lights command from `configs`.
    ///
    /// Only the first [`MAX_LIGHT_CONFIGS`] entries are kept; the rest are
    /// dropped without error.
    ///
    /// # Errors
    ///
    /// Returns [`LightsError::Empty`] when `configs` is empty.
    pub fn new(configs: &[LightConfig]) -> Result<Self, LightsError> {
        if configs.is_empty() {
            return Err(LightsError::Empty);
        }

        let configs = configs.iter().take(MAX_LIGHT_CONFIGS).copied().collect();
        Ok(Self { configs })
    }

    /// Configurations that will be encoded, in input order.
    #[must_use]
    pub fn configs(&self) -> &[LightConfig] {
        &self.configs
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let count = u8::try_from(self.configs.len()).unwrap_or(u8::MAX);
        self.configs
            .iter()
            .fold(
                FrameBuilder::new(MessageId::SetLights, SET_LIGHTS_PAYLOAD_LEN).u8(count),
                |frame, config| {
                    frame
                        .u8(config.channel.as_byte())
                        .u8(config.effect.as_byte())
                        .u8(config.start)
                        .u8(config.end)
                        .u8(config.cycles)
                },
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(LightConfig::new(LightChannel::Blue).steady(), (0, 14, 14, 0))]
    #[case(LightConfig::off(LightChannel::Red), (0, 0, 0, 0))]
    #[case(LightConfig::new(LightChannel::Tail).fade(), (1, 0, 14, 1))]
    #[case(LightConfig::new(LightChannel::Front).throb().with_intensity(7), (2, 0, 7, 1))]
    #[case(LightConfig::new(LightChannel::Green).flash().with_cycles(5), (3, 0, 14, 5))]
    #[case(LightConfig::new(LightChannel::Weapon).random(), (4, 0, 14, 1))]
    fn configs_resolve_effect_fields(
        #[case] config: LightConfig,
        #[case] expected: (u8, u8, u8, u8),
    ) {
        let observed = (
            config.effect().as_byte(),
            config.start(),
            config.end(),
            config.cycles(),
        );
        assert_eq!(expected, observed);
    }

    #[test]
    fn intensity_is_clamped() {
        let config = LightConfig::new(LightChannel::Red).with_intensity(200);
        assert_eq!(MAX_LIGHT_INTENSITY, config.end());
    }

    #[test]
    fn empty_configs_are_rejected() {
        assert_matches!(SetLights::new(&[]), Err(LightsError::Empty));
    }

    #[test]
    fn encode_keeps_only_three_configs() {
        let configs = [
            LightConfig::new(LightChannel::Red),
            LightConfig::off(LightChannel::Green),
            LightConfig::new(LightChannel::Blue),
            LightConfig::new(LightChannel::Tail),
            LightConfig::new(LightChannel::Front),
        ];
        let frame = SetLights::new(&configs)
            .expect("non-empty configs should build")
            .encode();

        assert_eq!(
            vec![
                0x11, 0x33, 0x03, 0x00, 0x00, 0x0e, 0x0e, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00,
                0x02, 0x00, 0x0e, 0x0e, 0x00,
            ],
            frame
        );
    }

    #[test]
    fn encode_zero_fills_unused_slots() {
        let frame = SetLights::new(&[LightConfig::new(LightChannel::Weapon).flash()])
            .expect("single config should build")
            .encode();

        assert_eq!(18, frame.len());
        assert_eq!(&[0x11, 0x33, 0x01, 0x05, 0x03, 0x00, 0x0e, 0x01], &frame[..8]);
        assert!(frame[8..].iter().all(|byte| *byte == 0));
    }
}
