/// A discovered BLE peripheral advertising the vehicle service.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FoundVehicle {
    adapter_name: String,
    device_id: String,
    address: String,
    local_name: Option<String>,
    rssi: Option<i16>,
}

impl FoundVehicle {
    /// Creates a new discovered-vehicle record.
    pub(crate) fn new(
        adapter_name: String,
        device_id: String,
        address: String,
        local_name: Option<String>,
        rssi: Option<i16>,
    ) -> Self {
        Self {
            adapter_name,
            device_id,
            address,
            local_name,
            rssi,
        }
    }

    /// Returns the adapter name used to discover this vehicle.
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Returns the backend-specific peripheral identifier.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the physical BLE address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the advertised local name, if present.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    #[must_use]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    /// Returns whether the id or address starts with `prefix`, ignoring case.
    ///
    /// An empty prefix matches every vehicle.
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let starts_with = |value: &str| {
            value
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        };
        starts_with(&self.device_id) || starts_with(&self.address)
    }
}

/// A characteristic description discovered on a connected peripheral.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CharacteristicInfo {
    uuid: String,
    properties: Vec<String>,
}

impl CharacteristicInfo {
    /// Creates a characteristic description.
    pub(crate) fn new(uuid: String, properties: Vec<String>) -> Self {
        Self { uuid, properties }
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Returns property labels for this characteristic.
    #[must_use]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }
}

/// A GATT service with discovered characteristics.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ServiceInfo {
    uuid: String,
    primary: bool,
    characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    /// Creates a service description.
    pub(crate) fn new(
        uuid: String,
        primary: bool,
        characteristics: Vec<CharacteristicInfo>,
    ) -> Self {
        Self {
            uuid,
            primary,
            characteristics,
        }
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Returns all characteristics in this service.
    #[must_use]
    pub fn characteristics(&self) -> &[CharacteristicInfo] {
        &self.characteristics
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn vehicle() -> FoundVehicle {
        FoundVehicle::new(
            "hci0".to_string(),
            "hci0/dev_E6_12_AB_01_02_03".to_string(),
            "E6:12:AB:01:02:03".to_string(),
            Some("Drive".to_string()),
            Some(-51),
        )
    }

    #[rstest]
    #[case("", true)]
    #[case("hci0/dev_e6", true)]
    #[case("e6:12", true)]
    #[case("E6:12:AB:01:02:03", true)]
    #[case("F0:", false)]
    #[case("E6:12:AB:01:02:03:04", false)]
    fn matches_prefix_checks_id_and_address(#[case] prefix: &str, #[case] expected: bool) {
        assert_eq!(expected, vehicle().matches_prefix(prefix));
    }
}
