use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, instrument};

use super::hardware::{NotificationStream, VehiclePeripheral};
use super::model::{CharacteristicInfo, FoundVehicle, ServiceInfo};
use crate::codec::{FrameBuilder, MessageId};
use crate::error::{FixtureError, VehicleError};
use crate::protocol::EndpointId;

const NOTIFICATION_CAPACITY: usize = 64;
const DEFAULT_VERSION: u16 = 0x2e2f;
const DEFAULT_BATTERY_LEVEL: u16 = 3_900;

/// Parsed fake scan fixture records.
#[derive(Debug, Clone, derive_more::Into)]
pub(crate) struct ScanFixture {
    vehicles: Vec<FoundVehicle>,
}

impl FromStr for ScanFixture {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let vehicles = parse_scan_fixture(value)?;
        Ok(Self { vehicles })
    }
}

/// Parsed fake telemetry frames.
#[derive(Debug, Clone, derive_more::Into)]
pub(crate) struct TelemetryFrames {
    frames: Vec<Vec<u8>>,
}

impl FromStr for TelemetryFrames {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let frames = parse_frames(value)?;
        Ok(Self { frames })
    }
}

/// GATT layout exposed by fake peripherals.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum FakeGatt {
    /// Vehicle service with both characteristics.
    #[default]
    Vehicle,
    /// Some other device without the vehicle service.
    Foreign,
    /// Vehicle service whose write characteristic is absent.
    MissingWriteCharacteristic,
}

/// Settings for constructing a fake hardware backend.
#[derive(Debug, Builder)]
pub(crate) struct FakeBackendConfig {
    scan_fixture: ScanFixture,
    telemetry: Option<TelemetryFrames>,
    #[builder(default)]
    discovery_delay: Duration,
    #[builder(default)]
    connect_delay: Duration,
    #[builder(default)]
    gatt: FakeGatt,
    #[builder(default = DEFAULT_VERSION)]
    version: u16,
    #[builder(default = DEFAULT_BATTERY_LEVEL)]
    battery_level: u16,
    /// Number of query requests the fake drops before it starts answering.
    #[builder(default)]
    unanswered_queries: usize,
}

/// Fake backend used in tests and non-hardware environments.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    config: FakeBackendConfig,
}

impl FakeBackend {
    /// Creates a fake backend from explicit settings.
    pub(crate) fn new(config: FakeBackendConfig) -> Self {
        Self { config }
    }

    /// Returns one fresh fake peripheral per fixture record.
    #[instrument(skip(self), level = "debug")]
    pub(crate) async fn discover_vehicles(
        &self,
        _duration: Duration,
    ) -> Result<Vec<Arc<dyn VehiclePeripheral>>, VehicleError> {
        if !self.config.discovery_delay.is_zero() {
            sleep(self.config.discovery_delay).await;
        }

        Ok(self
            .vehicles()
            .into_iter()
            .map(|vehicle| vehicle as Arc<dyn VehiclePeripheral>)
            .collect())
    }

    pub(crate) fn vehicles(&self) -> Vec<Arc<FakeVehicle>> {
        self.config
            .scan_fixture
            .vehicles
            .iter()
            .map(|device| Arc::new(FakeVehicle::new(device.clone(), &self.config)))
            .collect()
    }
}

/// A scripted vehicle peripheral.
///
/// Answers ping, version and battery queries, and replays the telemetry
/// fixture once notifications are subscribed.
#[derive(Debug)]
pub(crate) struct FakeVehicle {
    device: FoundVehicle,
    gatt: FakeGatt,
    connect_delay: Duration,
    version: u16,
    battery_level: u16,
    telemetry: Vec<Vec<u8>>,
    unanswered_queries: AtomicUsize,
    connected: AtomicBool,
    written: Mutex<Vec<Vec<u8>>>,
    notifications: broadcast::Sender<Vec<u8>>,
}

impl FakeVehicle {
    fn new(device: FoundVehicle, config: &FakeBackendConfig) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            device,
            gatt: config.gatt,
            connect_delay: config.connect_delay,
            version: config.version,
            battery_level: config.battery_level,
            telemetry: config
                .telemetry
                .clone()
                .map(Into::into)
                .unwrap_or_default(),
            unanswered_queries: AtomicUsize::new(config.unanswered_queries),
            connected: AtomicBool::new(false),
            written: Mutex::new(Vec::new()),
            notifications,
        }
    }

    /// Frames written so far, oldest first.
    pub(crate) fn written(&self) -> Vec<Vec<u8>> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pushes one frame to every open notification stream.
    pub(crate) fn notify(&self, frame: Vec<u8>) {
        if self.notifications.send(frame).is_err() {
            debug!("no open notification stream for fake frame");
        }
    }

    fn ensure_connected(&self) -> Result<(), VehicleError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VehicleError::NotConnected)
        }
    }

    fn response_to(&self, request: &[u8]) -> Option<Vec<u8>> {
        let response = match request.get(1).copied().and_then(MessageId::from_byte)? {
            MessageId::PingRequest => FrameBuilder::new(MessageId::PingResponse, 0).finish(),
            MessageId::VersionRequest => FrameBuilder::new(MessageId::VersionResponse, 2)
                .u16(self.version)
                .finish(),
            MessageId::BatteryLevelRequest => FrameBuilder::new(MessageId::BatteryLevelResponse, 2)
                .u16(self.battery_level)
                .finish(),
            _ => return None,
        };

        let dropped = self
            .unanswered_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        (!dropped).then_some(response)
    }
}

#[async_trait]
impl VehiclePeripheral for FakeVehicle {
    fn device(&self) -> &FoundVehicle {
        &self.device
    }

    async fn connect(&self) -> Result<(), VehicleError> {
        if !self.connect_delay.is_zero() {
            sleep(self.connect_delay).await;
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn discover_services(&self) -> Result<Vec<ServiceInfo>, VehicleError> {
        self.ensure_connected()?;
        Ok(fake_services(self.gatt))
    }

    async fn subscribe(&self, endpoint: EndpointId) -> Result<(), VehicleError> {
        self.ensure_connected()?;
        if endpoint == EndpointId::ReadCharacteristic {
            for frame in &self.telemetry {
                self.notify(frame.clone());
            }
        }
        Ok(())
    }

    async fn notifications(
        &self,
        endpoint: EndpointId,
    ) -> Result<NotificationStream, VehicleError> {
        self.ensure_connected()?;
        if endpoint != EndpointId::ReadCharacteristic {
            return Ok(Box::pin(tokio_stream::empty::<Vec<u8>>()));
        }
        let receiver = self.notifications.subscribe();
        Ok(Box::pin(
            BroadcastStream::new(receiver).filter_map(Result::ok),
        ))
    }

    async fn write(&self, endpoint: EndpointId, payload: &[u8]) -> Result<(), VehicleError> {
        self.ensure_connected()?;
        if endpoint != EndpointId::WriteCharacteristic {
            return Err(VehicleError::MissingCharacteristic { endpoint });
        }

        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.to_vec());
        if let Some(response) = self.response_to(payload) {
            self.notify(response);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VehicleError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn parse_scan_fixture(raw_fixture: &str) -> Result<Vec<FoundVehicle>, FixtureError> {
    if raw_fixture.trim().is_empty() {
        return Err(FixtureError::EmptyFixture);
    }

    raw_fixture
        .split(';')
        .map(parse_scan_record)
        .collect::<Result<Vec<_>, _>>()
}

/// Parses `adapter|address|local_name|rssi`, where `-` marks an absent value.
fn parse_scan_record(raw_record: &str) -> Result<FoundVehicle, FixtureError> {
    let fields: Vec<&str> = raw_record.split('|').map(str::trim).collect();
    let [adapter, address, local_name, rssi] = fields.as_slice() else {
        return Err(FixtureError::InvalidRecordFieldCount);
    };
    if [adapter, address, local_name, rssi]
        .iter()
        .any(|field| field.is_empty())
    {
        return Err(FixtureError::EmptyRecordField);
    }

    let local_name = (*local_name != "-").then(|| (*local_name).to_string());
    let rssi = if *rssi == "-" {
        None
    } else {
        Some(rssi.parse::<i16>()?)
    };

    Ok(FoundVehicle::new(
        (*adapter).to_string(),
        (*address).to_string(),
        (*address).to_string(),
        local_name,
        rssi,
    ))
}

fn parse_frames(raw_value: &str) -> Result<Vec<Vec<u8>>, FixtureError> {
    if raw_value.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw_value.split(',').map(parse_hex).collect()
}

fn parse_hex(raw_value: &str) -> Result<Vec<u8>, FixtureError> {
    let cleaned: String = raw_value.chars().filter(|c| !c.is_whitespace()).collect();
    if !cleaned.len().is_multiple_of(2) {
        return Err(FixtureError::InvalidHexLength);
    }

    cleaned
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let value = String::from_utf8_lossy(pair);
            u8::from_str_radix(&value, 16).map_err(|_| FixtureError::InvalidHexByte {
                value: value.to_string(),
            })
        })
        .collect()
}

fn fake_services(gatt: FakeGatt) -> Vec<ServiceInfo> {
    let read = CharacteristicInfo::new(
        EndpointId::ReadCharacteristic.uuid().to_string(),
        vec!["read".to_string(), "notify".to_string()],
    );
    let write = CharacteristicInfo::new(
        EndpointId::WriteCharacteristic.uuid().to_string(),
        vec!["write_without_response".to_string(), "write".to_string()],
    );

    match gatt {
        FakeGatt::Vehicle => vec![ServiceInfo::new(
            EndpointId::VehicleService.uuid().to_string(),
            true,
            vec![read, write],
        )],
        FakeGatt::Foreign => vec![ServiceInfo::new(
            "0000180f-0000-1000-8000-00805f9b34fb".to_string(),
            true,
            Vec::new(),
        )],
        FakeGatt::MissingWriteCharacteristic => vec![ServiceInfo::new(
            EndpointId::VehicleService.uuid().to_string(),
            true,
            vec![read],
        )],
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn fake_vehicle(unanswered_queries: usize) -> Arc<FakeVehicle> {
        let config = FakeBackendConfig::builder()
            .scan_fixture("hci0|E6:12:AB:01:02:03|Drive|-51".parse().expect("fixture parses"))
            .version(0x1234)
            .unanswered_queries(unanswered_queries)
            .build();
        FakeBackend::new(config)
            .vehicles()
            .pop()
            .expect("fixture has one vehicle")
    }

    #[rstest]
    #[case("hci0|E6:12:AB:01:02:03|Drive|-43", 1)]
    #[case("hci0|E6:12:AB:01:02:03|Drive|-43;hci1|F0:00:00:00:00:01|-|-", 2)]
    fn parse_scan_fixture_parses_records(#[case] fixture: &str, #[case] expected_count: usize) {
        let vehicles = parse_scan_fixture(fixture).expect("fixture should parse");
        assert_eq!(expected_count, vehicles.len());
    }

    #[test]
    fn parse_scan_fixture_rejects_invalid_field_count() {
        let result = parse_scan_fixture("hci0|E6:12:AB:01:02:03|Drive");
        assert_matches!(result, Err(FixtureError::InvalidRecordFieldCount));
    }

    #[test]
    fn parse_hex_rejects_odd_length() {
        assert_matches!(parse_hex("A"), Err(FixtureError::InvalidHexLength));
    }

    #[test]
    fn parse_hex_rejects_non_hex_digits() {
        assert_matches!(
            parse_hex("0G"),
            Err(FixtureError::InvalidHexByte { value }) if value == "0G"
        );
    }

    #[test]
    fn parse_frames_splits_on_commas() {
        let frames = parse_frames("0117, 03 19 34 12").expect("frames should parse");
        assert_eq!(vec![vec![0x01, 0x17], vec![0x03, 0x19, 0x34, 0x12]], frames);
    }

    #[tokio::test]
    async fn write_requires_connection() {
        let vehicle = fake_vehicle(0);
        let result = vehicle
            .write(EndpointId::WriteCharacteristic, &[0x01, 0x16])
            .await;
        assert_matches!(result, Err(VehicleError::NotConnected));
    }

    #[tokio::test]
    async fn queries_are_answered_after_dropped_ones() -> anyhow::Result<()> {
        let vehicle = fake_vehicle(1);
        vehicle.connect().await?;
        let mut stream = vehicle
            .notifications(EndpointId::ReadCharacteristic)
            .await?;

        vehicle
            .write(EndpointId::WriteCharacteristic, &[0x01, 0x18])
            .await?;
        vehicle
            .write(EndpointId::WriteCharacteristic, &[0x01, 0x18])
            .await?;

        assert_eq!(Some(vec![0x03, 0x19, 0x34, 0x12]), stream.next().await);
        assert_eq!(
            vec![vec![0x01, 0x18], vec![0x01, 0x18]],
            vehicle.written()
        );
        Ok(())
    }
}
