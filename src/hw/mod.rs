mod btleplug_backend;
mod fake_backend;
mod hardware;
mod model;
mod session;

#[cfg(test)]
pub(crate) use self::fake_backend::{FakeBackend, FakeVehicle};
pub use self::fake_backend::FakeGatt;
pub(crate) use self::fake_backend::{FakeBackendConfig, ScanFixture, TelemetryFrames};
pub use self::hardware::{HardwareClient, NotificationStream, VehiclePeripheral};
pub(crate) use self::hardware::{fake_hardware_client, real_hardware_client};
pub use self::model::{CharacteristicInfo, FoundVehicle, ServiceInfo};
pub(crate) use self::session::negotiate_vehicle_endpoints;
