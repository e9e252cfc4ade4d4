mod composite;
mod listener;
mod pending;
mod session;
#[cfg(test)]
pub(crate) mod test_support;

pub use self::composite::{DEFAULT_BRAKE_DELTA, DEFAULT_COMPOSITE_ACCELERATION};
pub use self::listener::ListenerToken;
pub use self::session::{
    CONNECT_TIMEOUT, ConnectionState, REQUEST_TIMEOUT, Vehicle, VehicleSetup,
};
