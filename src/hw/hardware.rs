use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::Stream;

use super::btleplug_backend::BtleplugBackend;
use super::fake_backend::{FakeBackend, FakeBackendConfig};
use super::model::{FoundVehicle, ServiceInfo};
use crate::error::VehicleError;
use crate::protocol::EndpointId;

/// Stream of raw frames notified on one characteristic.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Discovers vehicles on the selected BLE backend.
#[async_trait]
pub trait HardwareClient: Send + Sync {
    /// Scans for `duration` and returns every peripheral advertising the
    /// vehicle service.
    async fn discover_vehicles(
        &self,
        duration: Duration,
    ) -> Result<Vec<Arc<dyn VehiclePeripheral>>, VehicleError>;
}

/// The BLE link primitives a vehicle session is built on.
#[async_trait]
pub trait VehiclePeripheral: Send + Sync + fmt::Debug {
    /// Returns discovery details for this peripheral.
    fn device(&self) -> &FoundVehicle;

    async fn connect(&self) -> Result<(), VehicleError>;

    /// Discovers services and characteristics on the connected peripheral.
    async fn discover_services(&self) -> Result<Vec<ServiceInfo>, VehicleError>;

    async fn subscribe(&self, endpoint: EndpointId) -> Result<(), VehicleError>;

    /// Opens the stream of values notified on `endpoint`.
    ///
    /// Values notified before the stream is opened are not replayed.
    async fn notifications(&self, endpoint: EndpointId)
    -> Result<NotificationStream, VehicleError>;

    /// Writes one frame with response.
    async fn write(&self, endpoint: EndpointId, payload: &[u8]) -> Result<(), VehicleError>;

    async fn disconnect(&self) -> Result<(), VehicleError>;
}

#[derive(Debug)]
struct RealHardwareClient;

#[async_trait]
impl HardwareClient for RealHardwareClient {
    async fn discover_vehicles(
        &self,
        duration: Duration,
    ) -> Result<Vec<Arc<dyn VehiclePeripheral>>, VehicleError> {
        BtleplugBackend::new().await?.discover_vehicles(duration).await
    }
}

#[derive(Debug)]
struct FakeHardwareClient {
    backend: FakeBackend,
}

#[async_trait]
impl HardwareClient for FakeHardwareClient {
    async fn discover_vehicles(
        &self,
        duration: Duration,
    ) -> Result<Vec<Arc<dyn VehiclePeripheral>>, VehicleError> {
        self.backend.discover_vehicles(duration).await
    }
}

/// Creates a hardware client backed by the real BLE transport.
pub(crate) fn real_hardware_client() -> Box<dyn HardwareClient> {
    Box::new(RealHardwareClient)
}

/// Creates a hardware client backed by fake BLE fixtures.
pub(crate) fn fake_hardware_client(config: FakeBackendConfig) -> Box<dyn HardwareClient> {
    Box::new(FakeHardwareClient {
        backend: FakeBackend::new(config),
    })
}
