use tracing::instrument;

use super::model::{CharacteristicInfo, ServiceInfo};
use crate::error::VehicleError;
use crate::protocol::EndpointId;

/// Characteristic UUIDs resolved on a compatible vehicle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct NegotiatedEndpoints {
    pub(crate) read_uuid: String,
    pub(crate) write_uuid: String,
}

/// Validates that `services` belong to a vehicle and resolves its endpoints.
///
/// A missing control service means the peripheral is not a vehicle at all; a
/// missing or unusable characteristic inside that service fails the
/// connection attempt.
#[instrument(skip(services), level = "debug", fields(service_count = services.len()))]
pub(crate) fn negotiate_vehicle_endpoints(
    device_id: &str,
    services: &[ServiceInfo],
) -> Result<NegotiatedEndpoints, VehicleError> {
    let Some(service) = find_service(services, EndpointId::VehicleService.uuid()) else {
        return Err(VehicleError::IncompatiblePeripheral {
            device_id: device_id.to_string(),
        });
    };

    let read = find_characteristic(service, EndpointId::ReadCharacteristic.uuid())
        .filter(|characteristic| supports_notify(characteristic))
        .ok_or(VehicleError::MissingCharacteristic {
            endpoint: EndpointId::ReadCharacteristic,
        })?;
    let write = find_characteristic(service, EndpointId::WriteCharacteristic.uuid())
        .filter(|characteristic| supports_write(characteristic))
        .ok_or(VehicleError::MissingCharacteristic {
            endpoint: EndpointId::WriteCharacteristic,
        })?;

    Ok(NegotiatedEndpoints {
        read_uuid: read.uuid().to_ascii_lowercase(),
        write_uuid: write.uuid().to_ascii_lowercase(),
    })
}

fn find_service<'a>(services: &'a [ServiceInfo], uuid: &str) -> Option<&'a ServiceInfo> {
    services
        .iter()
        .find(|service| service.uuid().eq_ignore_ascii_case(uuid))
}

fn find_characteristic<'a>(service: &'a ServiceInfo, uuid: &str) -> Option<&'a CharacteristicInfo> {
    service
        .characteristics()
        .iter()
        .find(|characteristic| characteristic.uuid().eq_ignore_ascii_case(uuid))
}

fn supports_write(characteristic: &CharacteristicInfo) -> bool {
    characteristic_has_property(characteristic, "write")
        || characteristic_has_property(characteristic, "write_without_response")
}

fn supports_notify(characteristic: &CharacteristicInfo) -> bool {
    characteristic_has_property(characteristic, "notify")
        || characteristic_has_property(characteristic, "indicate")
}

fn characteristic_has_property(characteristic: &CharacteristicInfo, property: &str) -> bool {
    characteristic
        .properties()
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(property))
}
