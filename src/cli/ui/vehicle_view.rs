use std::fmt::{self, Display, Formatter};

use crate::hw::FoundVehicle;

use super::painter::Painter;
use super::table::Table;

/// Renders one discovered vehicle as a key-value table.
pub(crate) struct VehicleView<'a> {
    device: &'a FoundVehicle,
    name: Option<&'a str>,
    painter: &'a Painter,
}

impl<'a> VehicleView<'a> {
    /// `name` is the registered name, which wins over the advertised one.
    pub(crate) fn new(device: &'a FoundVehicle, name: Option<&'a str>, painter: &'a Painter) -> Self {
        Self {
            device,
            name,
            painter,
        }
    }
}

impl Display for VehicleView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = self
            .name
            .or_else(|| self.device.local_name())
            .unwrap_or("<unknown>");
        let table = Table::key_value(
            self.painter,
            vec![
                ("adapter", self.painter.value(self.device.adapter_name())),
                ("address", self.painter.value(self.device.address())),
                ("name", self.painter.value(name)),
                ("rssi", self.painter.value(rssi_label(self.device.rssi()))),
            ],
        );
        write!(f, "{table}")
    }
}

/// Renders scan results as one table row per vehicle.
pub(crate) struct VehicleListView<'a> {
    rows: Vec<(&'a FoundVehicle, Option<&'a str>)>,
    painter: &'a Painter,
}

impl<'a> VehicleListView<'a> {
    pub(crate) fn new(rows: Vec<(&'a FoundVehicle, Option<&'a str>)>, painter: &'a Painter) -> Self {
        Self { rows, painter }
    }
}

impl Display for VehicleListView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return write!(f, "{}", self.painter.warning("No vehicles found."));
        }

        let rows = self.rows.iter().map(|(device, registered)| {
            vec![
                self.painter.value(device.address()),
                device.local_name().unwrap_or("-").to_string(),
                registered.map_or_else(|| self.painter.muted("-"), str::to_string),
                rssi_label(device.rssi()),
            ]
        });
        let table = Table::grid(["address", "advertised", "registered", "rssi"], rows);
        write!(f, "{}", self.painter.heading("Vehicles:"))?;
        write!(f, "\n{table}")
    }
}

fn rssi_label(rssi: Option<i16>) -> String {
    rssi.map_or_else(|| "-".to_string(), |value| value.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn device(name: Option<&str>, rssi: Option<i16>) -> FoundVehicle {
        FoundVehicle::new(
            "hci0".into(),
            "hci0/dev_E6_12_AB_01_02_03".into(),
            "E6:12:AB:01:02:03".into(),
            name.map(String::from),
            rssi,
        )
    }

    #[rstest]
    #[case::advertised(Some("Drive"), None, "Drive")]
    #[case::registered(Some("Drive"), Some("Skull"), "Skull")]
    #[case::anonymous(None, None, "<unknown>")]
    fn vehicle_view_prefers_registered_name(
        #[case] advertised: Option<&str>,
        #[case] registered: Option<&str>,
        #[case] expected: &str,
    ) {
        let device = device(advertised, Some(-51));
        let painter = Painter::new(false);
        let rendered = VehicleView::new(&device, registered, &painter).to_string();

        assert!(rendered.contains(expected));
        assert!(rendered.contains("E6:12:AB:01:02:03"));
        assert!(rendered.contains("-51"));
    }

    #[test]
    fn vehicle_list_lists_every_vehicle() {
        let first = device(Some("Drive"), Some(-51));
        let second = device(None, None);
        let painter = Painter::new(false);
        let rendered =
            VehicleListView::new(vec![(&first, Some("Skull")), (&second, None)], &painter)
                .to_string();

        assert!(rendered.starts_with("Vehicles:"));
        assert!(rendered.contains("Skull"));
        assert_eq!(2, rendered.matches("E6:12:AB:01:02:03").count());
    }

    #[rstest]
    #[case::measured(Some(-51), "-51")]
    #[case::unknown(None, "-")]
    fn rssi_label_marks_unknown_signal(#[case] rssi: Option<i16>, #[case] expected: &str) {
        assert_eq!(expected, rssi_label(rssi));
    }

    #[test]
    fn empty_vehicle_list_warns() {
        let painter = Painter::new(false);
        let rendered = VehicleListView::new(Vec::new(), &painter).to_string();
        assert_eq!("No vehicles found.", rendered);
    }
}
