use std::collections::HashMap;
use std::sync::LazyLock;

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

/// GATT endpoints a vehicle must expose.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display)]
pub enum EndpointId {
    /// Vehicle control service.
    #[strum(to_string = "vehicle_service")]
    VehicleService,
    /// Characteristic the vehicle notifies telemetry on.
    #[strum(to_string = "read_characteristic")]
    ReadCharacteristic,
    /// Characteristic commands are written to.
    #[strum(to_string = "write_characteristic")]
    WriteCharacteristic,
}

impl EndpointId {
    /// Endpoint UUID in lowercase hyphenated form.
    #[must_use]
    pub fn uuid(self) -> &'static str {
        endpoint_metadata(self).uuid()
    }
}

/// Endpoint category in GATT.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub(crate) enum EndpointKind {
    #[strum(to_string = "service")]
    Service,
    #[strum(to_string = "characteristic")]
    Characteristic,
}

/// Descriptive metadata for one protocol endpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct EndpointMetadata {
    name: &'static str,
    uuid: &'static str,
    kind: EndpointKind,
}

impl EndpointMetadata {
    pub(crate) fn name(self) -> &'static str {
        self.name
    }

    pub(crate) fn uuid(self) -> &'static str {
        self.uuid
    }

    pub(crate) fn kind(self) -> EndpointKind {
        self.kind
    }
}

static ENDPOINTS_BY_ID: LazyLock<HashMap<EndpointId, EndpointMetadata>> = LazyLock::new(|| {
    EndpointId::iter()
        .map(|endpoint| (endpoint, metadata_for(endpoint)))
        .collect()
});

/// Returns metadata for one endpoint.
pub(crate) fn endpoint_metadata(endpoint: EndpointId) -> EndpointMetadata {
    ENDPOINTS_BY_ID
        .get(&endpoint)
        .copied()
        .unwrap_or_else(|| metadata_for(endpoint))
}

fn metadata_for(endpoint: EndpointId) -> EndpointMetadata {
    match endpoint {
        EndpointId::VehicleService => EndpointMetadata {
            name: "vehicle control service",
            uuid: "be15beef-6186-407e-8381-0bd89c4d8df4",
            kind: EndpointKind::Service,
        },
        EndpointId::ReadCharacteristic => EndpointMetadata {
            name: "vehicle telemetry",
            uuid: "be15bee0-6186-407e-8381-0bd89c4d8df4",
            kind: EndpointKind::Characteristic,
        },
        EndpointId::WriteCharacteristic => EndpointMetadata {
            name: "vehicle commands",
            uuid: "be15bee1-6186-407e-8381-0bd89c4d8df4",
            kind: EndpointKind::Characteristic,
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn endpoints_share_the_vehicle_uuid_base() {
        for endpoint in EndpointId::iter() {
            assert!(
                endpoint.uuid().ends_with("-6186-407e-8381-0bd89c4d8df4"),
                "{endpoint}"
            );
        }
    }

    #[test]
    fn service_is_the_only_service_endpoint() {
        let services: Vec<EndpointId> = EndpointId::iter()
            .filter(|endpoint| endpoint_metadata(*endpoint).kind() == EndpointKind::Service)
            .collect();
        assert_eq!(vec![EndpointId::VehicleService], services);
        assert_eq!(
            "vehicle telemetry",
            endpoint_metadata(EndpointId::ReadCharacteristic).name()
        );
    }
}
