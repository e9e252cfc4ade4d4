mod message_view;
mod painter;
mod spinner;
mod table;
mod transition_view;
mod vehicle_view;

pub(crate) use self::message_view::{StopSummaryView, TelemetryView};
pub(crate) use self::painter::Painter;
pub(crate) use self::spinner::Spinner;
pub(crate) use self::table::Table;
pub(crate) use self::transition_view::TransitionView;
pub(crate) use self::vehicle_view::{VehicleListView, VehicleView};
