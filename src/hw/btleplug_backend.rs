use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, PeripheralProperties,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument};

use super::hardware::{NotificationStream, VehiclePeripheral};
use super::model::{CharacteristicInfo, FoundVehicle, ServiceInfo};
use crate::error::VehicleError;
use crate::protocol::EndpointId;

/// Hardware backend backed by `btleplug`.
#[derive(Debug)]
pub(crate) struct BtleplugBackend {
    manager: Manager,
}

impl BtleplugBackend {
    /// Creates the real BLE backend.
    pub(crate) async fn new() -> Result<Self, VehicleError> {
        let manager = Manager::new().await?;
        Ok(Self { manager })
    }

    /// Scans every adapter for `duration` and collects vehicle peripherals.
    #[instrument(skip(self), level = "debug")]
    pub(crate) async fn discover_vehicles(
        &self,
        duration: Duration,
    ) -> Result<Vec<Arc<dyn VehiclePeripheral>>, VehicleError> {
        let adapters = self.adapters().await?;
        info!(adapter_count = adapters.len(), "starting BLE scan");

        for adapter in &adapters {
            adapter.adapter.start_scan(ScanFilter::default()).await?;
        }
        sleep(duration).await;

        let mut vehicles: Vec<Arc<dyn VehiclePeripheral>> = Vec::new();
        for adapter in &adapters {
            if let Err(error) = adapter.adapter.stop_scan().await {
                debug!(?error, "failed to stop adapter scan cleanly");
            }

            for peripheral in adapter.adapter.peripherals().await? {
                let Some(properties) = peripheral.properties().await? else {
                    continue;
                };
                if !advertises_vehicle_service(&properties) {
                    continue;
                }

                let device = FoundVehicle::new(
                    adapter.name.clone(),
                    peripheral.id().to_string(),
                    properties.address.to_string(),
                    properties.local_name,
                    properties.rssi,
                );
                debug!(device_id = device.device_id(), "found vehicle");
                vehicles.push(Arc::new(BtleplugVehicle { device, peripheral }));
            }
        }

        info!(vehicle_count = vehicles.len(), "BLE scan finished");
        Ok(vehicles)
    }

    #[instrument(skip(self), level = "trace")]
    async fn adapters(&self) -> Result<Vec<AdapterHandle>, VehicleError> {
        let adapters = self.manager.adapters().await?;
        if adapters.is_empty() {
            return Err(VehicleError::NoAdapters);
        }

        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let name = adapter.adapter_info().await?;
            handles.push(AdapterHandle { adapter, name });
        }
        Ok(handles)
    }
}

fn advertises_vehicle_service(properties: &PeripheralProperties) -> bool {
    let service_uuid = EndpointId::VehicleService.uuid();
    properties
        .services
        .iter()
        .any(|uuid| uuid.to_string().eq_ignore_ascii_case(service_uuid))
}

#[derive(Debug)]
struct AdapterHandle {
    adapter: Adapter,
    name: String,
}

/// A vehicle peripheral reached through `btleplug`.
#[derive(Debug)]
struct BtleplugVehicle {
    device: FoundVehicle,
    peripheral: Peripheral,
}

impl BtleplugVehicle {
    fn characteristic_for(&self, endpoint: EndpointId) -> Result<Characteristic, VehicleError> {
        let uuid = endpoint.uuid();
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| characteristic.uuid.to_string().eq_ignore_ascii_case(uuid))
            .ok_or(VehicleError::MissingCharacteristic { endpoint })
    }
}

#[async_trait]
impl VehiclePeripheral for BtleplugVehicle {
    fn device(&self) -> &FoundVehicle {
        &self.device
    }

    #[instrument(skip(self), level = "debug", fields(device_id = self.device.device_id()))]
    async fn connect(&self) -> Result<(), VehicleError> {
        if !self.peripheral.is_connected().await? {
            self.peripheral.connect().await?;
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(device_id = self.device.device_id()))]
    async fn discover_services(&self) -> Result<Vec<ServiceInfo>, VehicleError> {
        self.peripheral.discover_services().await?;
        Ok(collect_services(&self.peripheral))
    }

    #[instrument(skip(self), level = "trace", fields(?endpoint))]
    async fn subscribe(&self, endpoint: EndpointId) -> Result<(), VehicleError> {
        let characteristic = self.characteristic_for(endpoint)?;
        self.peripheral.subscribe(&characteristic).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "trace", fields(?endpoint))]
    async fn notifications(
        &self,
        endpoint: EndpointId,
    ) -> Result<NotificationStream, VehicleError> {
        let expected_uuid = endpoint.uuid();
        let notifications = self.peripheral.notifications().await?;
        Ok(Box::pin(notifications.filter_map(move |notification| {
            notification
                .uuid
                .to_string()
                .eq_ignore_ascii_case(expected_uuid)
                .then_some(notification.value)
        })))
    }

    #[instrument(skip(self, payload), level = "trace", fields(?endpoint, payload_len = payload.len()))]
    async fn write(&self, endpoint: EndpointId, payload: &[u8]) -> Result<(), VehicleError> {
        let characteristic = self.characteristic_for(endpoint)?;
        self.peripheral
            .write(&characteristic, payload, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug", fields(device_id = self.device.device_id()))]
    async fn disconnect(&self) -> Result<(), VehicleError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}

fn collect_services(peripheral: &Peripheral) -> Vec<ServiceInfo> {
    let mut services: Vec<ServiceInfo> = peripheral
        .services()
        .into_iter()
        .map(|service| {
            let mut characteristics: Vec<CharacteristicInfo> = service
                .characteristics
                .iter()
                .map(|characteristic| {
                    CharacteristicInfo::new(
                        characteristic.uuid.to_string().to_lowercase(),
                        property_labels(characteristic.properties),
                    )
                })
                .collect();
            characteristics.sort_by(|left, right| left.uuid().cmp(right.uuid()));

            ServiceInfo::new(
                service.uuid.to_string().to_lowercase(),
                service.primary,
                characteristics,
            )
        })
        .collect();
    services.sort_by(|left, right| left.uuid().cmp(right.uuid()));
    services
}

fn property_labels(flags: CharPropFlags) -> Vec<String> {
    let labels: Vec<String> = flags
        .iter_names()
        .map(|(name, _)| name.to_lowercase())
        .collect();
    if labels.is_empty() {
        vec!["none".to_string()]
    } else {
        labels
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(CharPropFlags::empty(), vec!["none"])]
    #[case(CharPropFlags::READ | CharPropFlags::NOTIFY, vec!["read", "notify"])]
    #[case(CharPropFlags::WRITE_WITHOUT_RESPONSE | CharPropFlags::WRITE, vec!["write_without_response", "write"])]
    fn property_labels_match_negotiation_names(
        #[case] flags: CharPropFlags,
        #[case] expected: Vec<&str>,
    ) {
        assert_eq!(expected, property_labels(flags));
    }
}
