use std::path::PathBuf;

use derive_more::From;
use thiserror::Error;

use crate::codec::{LightsError, MessageDecodeError, MessageId};
use crate::protocol::{EndpointId, endpoint_metadata};
use crate::track::TrackError;

/// Errors returned by BLE transport and vehicle session operations.
#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("BLE operation failed")]
    Ble(#[from] btleplug::Error),
    #[error("no BLE adapters were found")]
    NoAdapters,
    #[error("connecting to the vehicle did not finish within {timeout_ms} ms")]
    ConnectionTimeout { timeout_ms: u128 },
    #[error("device `{device_id}` does not expose the vehicle control service")]
    IncompatiblePeripheral { device_id: String },
    #[error(
        "required characteristic `{name}` ({uuid}) was not found on the vehicle",
        name = endpoint_metadata(*endpoint).name(),
        uuid = endpoint_metadata(*endpoint).uuid()
    )]
    MissingCharacteristic { endpoint: EndpointId },
    #[error("no {response} arrived within {timeout_ms} ms")]
    RequestTimeout {
        response: MessageId,
        timeout_ms: u128,
    },
    #[error("expected {expected} but the vehicle answered with {actual}")]
    UnexpectedResponse {
        expected: MessageId,
        actual: MessageId,
    },
    #[error("the vehicle session is not connected")]
    NotConnected,
    #[error("the vehicle session is already connected")]
    AlreadyConnected,
    #[error(transparent)]
    Lights(#[from] LightsError),
    #[error("no vehicle matching `{prefix}` was discovered")]
    NoVehicleFound { prefix: String },
    #[error("failed while waiting for Ctrl+C")]
    CtrlC { source: std::io::Error },
}

/// Errors returned when parsing fake backend fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("the fake discovery fixture is empty")]
    EmptyFixture,
    #[error("fixture records must contain four pipe-delimited fields")]
    InvalidRecordFieldCount,
    #[error("fixture records cannot contain empty mandatory fields")]
    EmptyRecordField,
    #[error("failed to parse RSSI value")]
    InvalidRssi(#[from] std::num::ParseIntError),
    #[error("hex payload length must be even")]
    InvalidHexLength,
    #[error("hex payload contains invalid byte `{value}`")]
    InvalidHexByte { value: String },
}

/// Errors returned while loading the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from `{}`", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("settings file `{}` is not valid JSON", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("configured track layout is invalid")]
    Track(#[from] TrackError),
}

/// Errors returned when validating runtime backend options.
#[derive(Debug, Error)]
pub(crate) enum CliConfigError {
    #[error("missing fake scan fixture while fake mode is enabled")]
    MissingFakeScanFixture,
}

/// Errors returned by telemetry initialisation.
#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error("failed to install tracing subscriber")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Top-level protocol errors wrapping module-specific error types.
#[derive(Debug, Error, From)]
pub enum ProtocolError {
    #[error(transparent)]
    #[from(MessageDecodeError, Box<MessageDecodeError>)]
    Decode(Box<MessageDecodeError>),
    #[error(transparent)]
    #[from(LightsError, Box<LightsError>)]
    Lights(Box<LightsError>),
    #[error(transparent)]
    #[from(TrackError, Box<TrackError>)]
    Track(Box<TrackError>),
    #[error(transparent)]
    #[from(ConfigError, Box<ConfigError>)]
    Config(Box<ConfigError>),
    #[error(transparent)]
    #[from(VehicleError, Box<VehicleError>)]
    Vehicle(Box<VehicleError>),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_characteristic_names_the_endpoint() {
        let error = VehicleError::MissingCharacteristic {
            endpoint: EndpointId::WriteCharacteristic,
        };
        assert_eq!(
            "required characteristic `vehicle commands` (be15bee1-6186-407e-8381-0bd89c4d8df4) was not found on the vehicle",
            error.to_string()
        );
    }

    #[test]
    fn request_timeout_names_the_awaited_response() {
        let error = VehicleError::RequestTimeout {
            response: MessageId::VersionResponse,
            timeout_ms: 1000,
        };
        assert_eq!("no version_response arrived within 1000 ms", error.to_string());
    }

    #[test]
    fn protocol_error_boxes_module_errors() {
        let error = ProtocolError::from(TrackError::PieceNotFound { id: 4 });
        assert_matches!(error, ProtocolError::Track(inner) if *inner == TrackError::PieceNotFound { id: 4 });
    }
}
