mod app;
mod cli;
mod codec;
mod config;
mod error;
mod hw;
mod protocol;
mod telemetry;
mod terminal;
mod track;
mod vehicle;

pub use app::{
    RunOptions, VehicleConnector, connect_vehicle, fake_hardware_client, real_hardware_client,
    run, run_with_clients,
};
pub use cli::{
    Args, Command, DEFAULT_SCAN_DURATION, DriveArgs, FakeArgs, ListenArgs, LogLevel,
    OutputFormat, QueryArgs, ScanArgs, TargetArgs, TrackArgs,
};
pub use codec::{
    ChangeLane, Command as VehicleCommand, IntersectionUpdate, LightChannel, LightConfig,
    LightEffect, LightsError, MAX_LIGHT_CONFIGS, MAX_LIGHT_INTENSITY, MessageDecodeError,
    MessageId, OffsetUpdate, PositionUpdate, RawFrame, SetLights, SetSpeed, Telemetry,
    TransitionUpdate, TurnType, VehicleMessage,
};
pub use config::{
    PieceSettings, Settings, SetupSettings, TrackSettings, VehicleSettings,
    default_settings_path,
};
pub use error::{ConfigError, FixtureError, ProtocolError, VehicleError};
pub use hw::{
    CharacteristicInfo, FakeGatt, FoundVehicle, HardwareClient, NotificationStream, ServiceInfo,
    VehiclePeripheral,
};
pub use protocol::EndpointId;
pub use terminal::{SystemTerminalClient, TerminalClient};
pub use track::{
    Coordinate, FINISH_PIECE_ID, LANE_COUNT, Piece, PieceKind, START_PIECE_ID, Track, TrackError,
    TrackPiece,
};
pub use vehicle::{
    CONNECT_TIMEOUT, ConnectionState, DEFAULT_BRAKE_DELTA, DEFAULT_COMPOSITE_ACCELERATION,
    ListenerToken, REQUEST_TIMEOUT, Vehicle, VehicleSetup,
};
