use std::sync::Arc;

use tokio::sync::mpsc;

use super::{ListenerToken, Vehicle, VehicleSetup};
use crate::codec::{FrameBuilder, MessageId, VehicleMessage};
use crate::hw::{FakeBackend, FakeBackendConfig, FakeVehicle, ScanFixture};

pub(crate) fn fixture() -> ScanFixture {
    "hci0|E6:12:AB:01:02:03|Drive|-51"
        .parse()
        .expect("fixture parses")
}

pub(crate) fn default_config() -> FakeBackendConfig {
    FakeBackendConfig::builder().scan_fixture(fixture()).build()
}

pub(crate) fn fake_vehicle(config: FakeBackendConfig) -> Arc<FakeVehicle> {
    FakeBackend::new(config)
        .vehicles()
        .pop()
        .expect("fixture has one vehicle")
}

pub(crate) async fn connected_vehicle(
    config: FakeBackendConfig,
) -> anyhow::Result<(Vehicle, Arc<FakeVehicle>)> {
    let fake = fake_vehicle(config);
    let vehicle = Vehicle::new(fake.clone(), VehicleSetup::default());
    vehicle.connect().await?;
    Ok((vehicle, fake))
}

/// Forwards every message matching `filter` into a channel.
pub(crate) fn message_channel(
    vehicle: &Vehicle,
    filter: Option<MessageId>,
) -> (ListenerToken, mpsc::UnboundedReceiver<VehicleMessage>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let token = vehicle.add_listener(filter, move |message| {
        let _ = sender.send(message.clone());
    });
    (token, receiver)
}

pub(crate) fn position_frame(location: u8, piece: u8, speed: u16) -> Vec<u8> {
    FrameBuilder::new(MessageId::PositionUpdate, 15)
        .u8(location)
        .u8(piece)
        .f32(0.0)
        .u16(speed)
        .u8(0x47)
        .u8(0)
        .u8(0)
        .u16(0)
        .u16(speed)
        .finish()
}
