use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bon::Builder;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_stream::StreamExt;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, trace, warn};

use super::listener::{Listener, ListenerRegistry, ListenerToken};
use super::pending::PendingRequests;
use crate::codec::{
    ChangeLane, Command, FrameHex, LightChannel, LightConfig, MessageId, SetLights, SetSpeed,
    Telemetry, TurnType, VehicleMessage,
};
use crate::error::VehicleError;
use crate::hw::{FoundVehicle, NotificationStream, VehiclePeripheral, negotiate_vehicle_endpoints};
use crate::protocol::EndpointId;

/// Upper bound for establishing and initialising a vehicle link.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for a request/response query.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) const RESET_LIGHTS: [[LightConfig; 3]; 2] = [
    [
        LightConfig::new(LightChannel::Blue),
        LightConfig::off(LightChannel::Green),
        LightConfig::off(LightChannel::Red),
    ],
    [
        LightConfig::off(LightChannel::Tail),
        LightConfig::off(LightChannel::Front),
        LightConfig::off(LightChannel::Weapon),
    ],
];

/// Per-vehicle settings applied when a session connects.
///
/// ```
/// use overdrive::VehicleSetup;
///
/// let setup = VehicleSetup::builder().setup_id("4711").initial_offset(-23.0).build();
/// assert_eq!("4711", setup.setup_id());
/// assert_eq!(None, setup.name());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Builder)]
pub struct VehicleSetup {
    #[builder(into, default)]
    setup_id: String,
    #[builder(into)]
    name: Option<String>,
    /// Lane offset from the road centre applied on connect, in mm.
    #[builder(default)]
    initial_offset: f32,
}

impl VehicleSetup {
    /// Id of the setup (race environment) this vehicle belongs to.
    #[must_use]
    pub fn setup_id(&self) -> &str {
        &self.setup_id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn initial_offset(&self) -> f32 {
        self.initial_offset
    }
}

/// Lifecycle of a vehicle session.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug)]
struct WriteRequest {
    command: Command,
    done: Option<oneshot::Sender<Result<(), VehicleError>>>,
}

/// Tasks and handles that exist while the BLE link is open.
#[derive(Debug)]
struct Link {
    commands: mpsc::UnboundedSender<WriteRequest>,
    shutdown: CancellationToken,
    _shutdown_on_drop: DropGuard,
    runtime: Handle,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    speed_listener: Option<ListenerToken>,
}

#[derive(Debug)]
pub(super) struct Shared {
    peripheral: Arc<dyn VehiclePeripheral>,
    setup: VehicleSetup,
    state: Mutex<ConnectionState>,
    pub(super) listeners: Arc<ListenerRegistry>,
    pending: Arc<PendingRequests>,
    speed: Arc<AtomicU16>,
    link: Mutex<Option<Link>>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.lock_state() = state;
    }

    fn lock_link(&self) -> MutexGuard<'_, Option<Link>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A session with one physical vehicle.
///
/// Cloning yields another handle to the same session. Commands are queued
/// onto a single writer task and reach the vehicle in call order; received
/// frames are decoded on a reader task and fanned out to listeners.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub(super) shared: Arc<Shared>,
}

impl Vehicle {
    /// Creates a disconnected session for a discovered peripheral.
    #[must_use]
    pub fn new(peripheral: Arc<dyn VehiclePeripheral>, setup: VehicleSetup) -> Self {
        Self {
            shared: Arc::new(Shared {
                peripheral,
                setup,
                state: Mutex::new(ConnectionState::Disconnected),
                listeners: Arc::new(ListenerRegistry::default()),
                pending: Arc::new(PendingRequests::default()),
                speed: Arc::new(AtomicU16::new(0)),
                link: Mutex::new(None),
            }),
        }
    }

    /// Stable peripheral id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.device().device_id()
    }

    #[must_use]
    pub fn address(&self) -> &str {
        self.device().address()
    }

    /// Configured display name, falling back to the advertised name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.shared
            .setup
            .name()
            .or_else(|| self.device().local_name())
    }

    #[must_use]
    pub fn device(&self) -> &FoundVehicle {
        self.shared.peripheral.device()
    }

    #[must_use]
    pub fn setup(&self) -> &VehicleSetup {
        &self.shared.setup
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.lock_state()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Last speed reported by position telemetry, in mm/s.
    #[must_use]
    pub fn speed(&self) -> u16 {
        self.shared.speed.load(Ordering::Relaxed)
    }

    /// Number of registered listeners, including internal ones.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Number of queries still waiting for their response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Connects, negotiates endpoints and brings the vehicle into SDK mode.
    ///
    /// On success the vehicle has SDK mode enabled, the configured offset
    /// applied, its lights reset and speed tracking installed.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is not disconnected, when the link
    /// cannot be established within [`CONNECT_TIMEOUT`], or when the
    /// peripheral is not a compatible vehicle. The session is disconnected
    /// again after any failure.
    #[instrument(skip(self), level = "debug", fields(device_id = self.id()))]
    pub async fn connect(&self) -> Result<(), VehicleError> {
        {
            let mut state = self.shared.lock_state();
            if *state != ConnectionState::Disconnected {
                return Err(VehicleError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }

        let established = timeout(CONNECT_TIMEOUT, self.establish())
            .await
            .map_err(|_elapsed| VehicleError::ConnectionTimeout {
                timeout_ms: CONNECT_TIMEOUT.as_millis(),
            })
            .and_then(|result| result);

        if let Err(error) = established {
            self.close_link().await;
            if let Err(disconnect_error) = self.shared.peripheral.disconnect().await {
                debug!(%disconnect_error, "failed to release peripheral after connect error");
            }
            self.shared.set_state(ConnectionState::Disconnected);
            return Err(error);
        }

        self.shared.set_state(ConnectionState::Connected);
        info!("vehicle connected");
        Ok(())
    }

    /// Tears the link down and removes internal listeners.
    ///
    /// Commands queued before the call are still written. Returns the state
    /// the session was in; only a connected session is torn down.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport fails to disconnect.
    #[instrument(skip(self), level = "debug", fields(device_id = self.id()))]
    pub async fn disconnect(&self) -> Result<ConnectionState, VehicleError> {
        {
            let mut state = self.shared.lock_state();
            if *state != ConnectionState::Connected {
                return Ok(*state);
            }
            *state = ConnectionState::Disconnecting;
        }

        self.close_link().await;
        let result = self.shared.peripheral.disconnect().await;
        self.shared.set_state(ConnectionState::Disconnected);
        result?;

        info!("vehicle disconnected");
        Ok(ConnectionState::Connected)
    }

    /// Registers a listener for messages with id `filter`, or for every
    /// message when `filter` is `None`.
    ///
    /// Listeners see telemetry after it is decoded and commands after they are
    /// written.
    pub fn add_listener<F>(&self, filter: Option<MessageId>, listener: F) -> ListenerToken
    where
        F: Fn(&VehicleMessage) + Send + Sync + 'static,
    {
        self.shared.listeners.add(filter, Arc::new(listener))
    }

    /// Removes a listener; returns whether it was registered.
    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        self.shared.listeners.remove(token)
    }

    /// Queues `command` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn send(&self, command: Command) -> Result<(), VehicleError> {
        if !self.is_connected() {
            return Err(VehicleError::NotConnected);
        }
        self.enqueue(command, None)
    }

    /// Sets the speed with the default acceleration.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn set_speed(&self, speed: u16) -> Result<(), VehicleError> {
        self.set_speed_with(SetSpeed::builder().speed(speed).build())
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn set_speed_with(&self, command: SetSpeed) -> Result<(), VehicleError> {
        self.send(Command::SetSpeed(command))
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn set_offset(&self, offset: f32) -> Result<(), VehicleError> {
        self.send(Command::SetOffset(offset))
    }

    /// Moves to `offset` with the default lane-change speed and acceleration.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn change_lane(&self, offset: f32) -> Result<(), VehicleError> {
        self.change_lane_with(ChangeLane::builder().offset(offset).build())
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn change_lane_with(&self, command: ChangeLane) -> Result<(), VehicleError> {
        self.send(Command::ChangeLane(command))
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn cancel_lane_change(&self) -> Result<(), VehicleError> {
        self.send(Command::CancelLaneChange)
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn turn_left(&self) -> Result<(), VehicleError> {
        self.send(Command::Turn(TurnType::Left))
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn turn_right(&self) -> Result<(), VehicleError> {
        self.send(Command::Turn(TurnType::Right))
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn u_turn(&self) -> Result<(), VehicleError> {
        self.send(Command::Turn(TurnType::UTurn))
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn u_turn_jump(&self) -> Result<(), VehicleError> {
        self.send(Command::Turn(TurnType::UTurnJump))
    }

    /// # Errors
    ///
    /// Returns [`VehicleError::NotConnected`] unless the session is connected.
    pub fn set_sdk_mode(&self, on: bool) -> Result<(), VehicleError> {
        self.send(Command::SdkMode(on))
    }

    /// Applies up to three light patterns; further entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error when `configs` is empty or the session is not
    /// connected.
    pub fn set_lights(&self, configs: &[LightConfig]) -> Result<(), VehicleError> {
        self.send(Command::SetLights(SetLights::new(configs)?))
    }

    /// Measures the round trip of a ping.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::RequestTimeout`] when no response arrives
    /// within [`REQUEST_TIMEOUT`].
    pub async fn query_ping(&self) -> Result<Duration, VehicleError> {
        let started = Instant::now();
        self.request(Command::PingRequest, MessageId::PingResponse, REQUEST_TIMEOUT)
            .await?;
        Ok(started.elapsed())
    }

    /// Reads the firmware version.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::RequestTimeout`] when no response arrives
    /// within [`REQUEST_TIMEOUT`].
    pub async fn query_version(&self) -> Result<u16, VehicleError> {
        let expected = MessageId::VersionResponse;
        match self
            .request(Command::VersionRequest, expected, REQUEST_TIMEOUT)
            .await?
        {
            Telemetry::VersionResponse(version) => Ok(version),
            other => Err(VehicleError::UnexpectedResponse {
                expected,
                actual: other.message_id(),
            }),
        }
    }

    /// Reads the battery level.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::RequestTimeout`] when no response arrives
    /// within [`REQUEST_TIMEOUT`].
    pub async fn query_battery_level(&self) -> Result<u16, VehicleError> {
        let expected = MessageId::BatteryLevelResponse;
        match self
            .request(Command::BatteryLevelRequest, expected, REQUEST_TIMEOUT)
            .await?
        {
            Telemetry::BatteryLevelResponse(level) => Ok(level),
            other => Err(VehicleError::UnexpectedResponse {
                expected,
                actual: other.message_id(),
            }),
        }
    }

    /// Sends `command` and waits up to `wait` for the next `response` frame.
    ///
    /// The response is also dispatched to listeners like any other telemetry.
    /// The request is deregistered whether it succeeds or times out.
    ///
    /// # Errors
    ///
    /// Returns [`VehicleError::RequestTimeout`] when no matching frame arrives
    /// in time, [`VehicleError::NotConnected`] when the session is not
    /// connected, or the transport error when the request cannot be written.
    #[instrument(skip(self), level = "debug", fields(device_id = self.id()))]
    pub async fn request(
        &self,
        command: Command,
        response: MessageId,
        wait: Duration,
    ) -> Result<Telemetry, VehicleError> {
        if !self.is_connected() {
            return Err(VehicleError::NotConnected);
        }

        let (_registration, receiver) = self.shared.pending.register(response);
        let (done, written) = oneshot::channel();
        self.enqueue(command, Some(done))?;
        let answered = async {
            written
                .await
                .map_err(|_closed| VehicleError::NotConnected)??;
            receiver.await.map_err(|_closed| VehicleError::NotConnected)
        };

        timeout(wait, answered).await.unwrap_or_else(|_elapsed| {
            debug!(%response, "request timed out");
            Err(VehicleError::RequestTimeout {
                response,
                timeout_ms: wait.as_millis(),
            })
        })
    }

    /// Runs `task` on the link's runtime until it completes or the link closes.
    pub(super) fn spawn_while_linked<F>(&self, task: F) -> Result<(), VehicleError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let link = self.shared.lock_link();
        let Some(link) = link.as_ref() else {
            return Err(VehicleError::NotConnected);
        };

        let shutdown = link.shutdown.clone();
        link.runtime.spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = task => {}
            }
        });
        Ok(())
    }

    async fn establish(&self) -> Result<(), VehicleError> {
        let link = self.open_link().await?;
        *self.shared.lock_link() = Some(link);

        self.send_and_confirm(Command::SdkMode(true)).await?;
        self.send_and_confirm(Command::SetOffset(self.shared.setup.initial_offset))
            .await?;
        for pattern in &RESET_LIGHTS {
            self.send_and_confirm(Command::SetLights(SetLights::new(pattern)?))
                .await?;
        }

        let speed = Arc::clone(&self.shared.speed);
        let speed_listener: Listener = Arc::new(move |message: &VehicleMessage| {
            if let VehicleMessage::Telemetry(Telemetry::PositionUpdate(update)) = message {
                speed.store(update.speed, Ordering::Relaxed);
            }
        });
        let token = self
            .shared
            .listeners
            .add(Some(MessageId::PositionUpdate), speed_listener);

        let mut link = self.shared.lock_link();
        let Some(link) = link.as_mut() else {
            self.shared.listeners.remove(token);
            return Err(VehicleError::NotConnected);
        };
        link.speed_listener = Some(token);
        Ok(())
    }

    async fn open_link(&self) -> Result<Link, VehicleError> {
        let peripheral = &self.shared.peripheral;
        peripheral.connect().await?;

        let services = peripheral.discover_services().await?;
        let endpoints = negotiate_vehicle_endpoints(self.id(), &services)?;
        debug!(
            read = %endpoints.read_uuid,
            write = %endpoints.write_uuid,
            "negotiated vehicle endpoints"
        );

        let notifications = peripheral
            .notifications(EndpointId::ReadCharacteristic)
            .await?;
        peripheral.subscribe(EndpointId::ReadCharacteristic).await?;

        let shutdown = CancellationToken::new();
        let (commands, requests) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(
            Arc::clone(peripheral),
            Arc::clone(&self.shared.listeners),
            requests,
        ));
        let reader = tokio::spawn(run_reader(
            notifications,
            Arc::clone(&self.shared.listeners),
            Arc::clone(&self.shared.pending),
            shutdown.clone(),
        ));

        Ok(Link {
            commands,
            shutdown: shutdown.clone(),
            _shutdown_on_drop: shutdown.drop_guard(),
            runtime: Handle::current(),
            writer,
            reader,
            speed_listener: None,
        })
    }

    async fn close_link(&self) {
        let Some(link) = self.shared.lock_link().take() else {
            return;
        };
        let Link {
            commands,
            shutdown,
            writer,
            reader,
            speed_listener,
            ..
        } = link;

        if let Some(token) = speed_listener {
            self.shared.listeners.remove(token);
        }

        drop(commands);
        if let Err(error) = writer.await {
            warn!(%error, "command writer task failed");
        }
        shutdown.cancel();
        if let Err(error) = reader.await {
            warn!(%error, "telemetry reader task failed");
        }
    }

    fn enqueue(
        &self,
        command: Command,
        done: Option<oneshot::Sender<Result<(), VehicleError>>>,
    ) -> Result<(), VehicleError> {
        let link = self.shared.lock_link();
        let Some(link) = link.as_ref() else {
            return Err(VehicleError::NotConnected);
        };
        link.commands
            .send(WriteRequest { command, done })
            .map_err(|_closed| VehicleError::NotConnected)
    }

    async fn send_and_confirm(&self, command: Command) -> Result<(), VehicleError> {
        let (done, confirmed) = oneshot::channel();
        self.enqueue(command, Some(done))?;
        confirmed
            .await
            .map_err(|_closed| VehicleError::NotConnected)?
    }
}

async fn run_writer(
    peripheral: Arc<dyn VehiclePeripheral>,
    listeners: Arc<ListenerRegistry>,
    mut requests: mpsc::UnboundedReceiver<WriteRequest>,
) {
    while let Some(WriteRequest { command, done }) = requests.recv().await {
        let frame = command.encode();
        let result = peripheral
            .write(EndpointId::WriteCharacteristic, &frame)
            .await;

        match &result {
            Ok(()) => {
                trace!(message_id = %command.message_id(), "command written");
                listeners.dispatch(&VehicleMessage::Command(command));
            }
            Err(error) => {
                warn!(%error, message_id = %command.message_id(), "failed to write command");
            }
        }

        if let Some(done) = done
            && done.send(result).is_err()
        {
            debug!("command confirmation receiver dropped");
        }
    }
}

async fn run_reader(
    mut notifications: NotificationStream,
    listeners: Arc<ListenerRegistry>,
    pending: Arc<PendingRequests>,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            () = shutdown.cancelled() => break,
            frame = notifications.next() => frame,
        };
        let Some(frame) = frame else {
            debug!("notification stream closed");
            break;
        };

        match Telemetry::decode(&frame) {
            Ok(Some(telemetry)) => {
                listeners.dispatch(&VehicleMessage::Telemetry(telemetry.clone()));
                pending.resolve(&telemetry);
            }
            Ok(None) => trace!(frame = %FrameHex(&frame), "dropping frame with unhandled id"),
            Err(error) => debug!(frame = %FrameHex(&frame), %error, "dropping malformed frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hw::{FakeBackendConfig, FakeGatt};
    use crate::vehicle::test_support::{
        connected_vehicle, default_config, fake_vehicle, fixture, message_channel, position_frame,
    };

    #[tokio::test]
    async fn connect_sends_initialisation_sequence() -> anyhow::Result<()> {
        let fake = fake_vehicle(default_config());
        let setup = VehicleSetup::builder().initial_offset(-23.0).build();
        let vehicle = Vehicle::new(fake.clone(), setup);

        vehicle.connect().await?;

        let expected = vec![
            Command::SdkMode(true).encode(),
            Command::SetOffset(-23.0).encode(),
            Command::SetLights(SetLights::new(&RESET_LIGHTS[0])?).encode(),
            Command::SetLights(SetLights::new(&RESET_LIGHTS[1])?).encode(),
        ];
        assert_eq!(expected, fake.written());
        assert_eq!(ConnectionState::Connected, vehicle.state());
        assert_eq!(1, vehicle.listener_count());
        Ok(())
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() -> anyhow::Result<()> {
        let (vehicle, _fake) = connected_vehicle(default_config()).await?;
        assert_matches!(vehicle.connect().await, Err(VehicleError::AlreadyConnected));
        Ok(())
    }

    #[tokio::test]
    async fn foreign_peripheral_is_rejected() {
        let fake = fake_vehicle(
            FakeBackendConfig::builder()
                .scan_fixture(fixture())
                .gatt(FakeGatt::Foreign)
                .build(),
        );
        let vehicle = Vehicle::new(fake.clone(), VehicleSetup::default());

        let result = vehicle.connect().await;

        assert_matches!(result, Err(VehicleError::IncompatiblePeripheral { .. }));
        assert_eq!(ConnectionState::Disconnected, vehicle.state());
        assert!(fake.written().is_empty());
    }

    #[tokio::test]
    async fn missing_write_characteristic_fails_the_connection() {
        let fake = fake_vehicle(
            FakeBackendConfig::builder()
                .scan_fixture(fixture())
                .gatt(FakeGatt::MissingWriteCharacteristic)
                .build(),
        );
        let vehicle = Vehicle::new(fake, VehicleSetup::default());

        assert_matches!(
            vehicle.connect().await,
            Err(VehicleError::MissingCharacteristic {
                endpoint: EndpointId::WriteCharacteristic
            })
        );
        assert_eq!(0, vehicle.listener_count());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_connect_times_out() {
        let fake = fake_vehicle(
            FakeBackendConfig::builder()
                .scan_fixture(fixture())
                .connect_delay(Duration::from_secs(6))
                .build(),
        );
        let vehicle = Vehicle::new(fake, VehicleSetup::default());

        assert_matches!(
            vehicle.connect().await,
            Err(VehicleError::ConnectionTimeout { timeout_ms: 5000 })
        );
        assert_eq!(ConnectionState::Disconnected, vehicle.state());
    }

    #[tokio::test]
    async fn commands_require_a_connection() {
        let fake = fake_vehicle(default_config());
        let vehicle = Vehicle::new(fake, VehicleSetup::default());

        assert_matches!(vehicle.set_speed(400), Err(VehicleError::NotConnected));
        assert_matches!(
            vehicle.query_version().await,
            Err(VehicleError::NotConnected)
        );
    }

    #[tokio::test]
    async fn empty_light_list_is_rejected() -> anyhow::Result<()> {
        let (vehicle, _fake) = connected_vehicle(default_config()).await?;
        assert_matches!(vehicle.set_lights(&[]), Err(VehicleError::Lights(_)));
        Ok(())
    }

    #[tokio::test]
    async fn written_commands_reach_filtered_listeners() -> anyhow::Result<()> {
        let (vehicle, fake) = connected_vehicle(default_config()).await?;
        let (_token, mut received) = message_channel(&vehicle, Some(MessageId::SetSpeed));

        vehicle.set_speed(400)?;
        vehicle.turn_left()?;
        vehicle.set_speed_with(SetSpeed::builder().speed(0).acceleration(500).build())?;

        let first = received.recv().await;
        let second = received.recv().await;
        assert_eq!(
            Some(VehicleMessage::Command(Command::SetSpeed(
                SetSpeed::builder().speed(400).build()
            ))),
            first
        );
        assert_eq!(
            Some(VehicleMessage::Command(Command::SetSpeed(
                SetSpeed::builder().speed(0).acceleration(500).build()
            ))),
            second
        );
        assert_eq!(
            Some(&Command::Turn(TurnType::Left).encode()),
            fake.written().get(5)
        );
        Ok(())
    }

    #[tokio::test]
    async fn queries_return_decoded_values() -> anyhow::Result<()> {
        let config = FakeBackendConfig::builder()
            .scan_fixture(fixture())
            .version(0x1234)
            .battery_level(3_700)
            .build();
        let (vehicle, _fake) = connected_vehicle(config).await?;

        assert_eq!(0x1234, vehicle.query_version().await?);
        assert_eq!(3_700, vehicle.query_battery_level().await?);
        vehicle.query_ping().await?;
        assert_eq!(0, vehicle.pending_requests());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_query_leaves_no_registration_behind() -> anyhow::Result<()> {
        let config = FakeBackendConfig::builder()
            .scan_fixture(fixture())
            .version(0x1234)
            .unanswered_queries(1)
            .build();
        let (vehicle, _fake) = connected_vehicle(config).await?;

        let started = Instant::now();
        assert_matches!(
            vehicle.query_version().await,
            Err(VehicleError::RequestTimeout {
                response: MessageId::VersionResponse,
                timeout_ms: 1000
            })
        );
        assert_eq!(REQUEST_TIMEOUT, started.elapsed());
        assert_eq!(0, vehicle.pending_requests());

        assert_eq!(0x1234, vehicle.query_version().await?);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_request_write_is_reported_without_waiting() -> anyhow::Result<()> {
        let (vehicle, fake) = connected_vehicle(default_config()).await?;
        fake.disconnect().await?;

        let started = Instant::now();
        assert_matches!(vehicle.query_version().await, Err(VehicleError::NotConnected));
        assert!(started.elapsed() < REQUEST_TIMEOUT);
        assert_eq!(0, vehicle.pending_requests());
        Ok(())
    }

    #[tokio::test]
    async fn position_telemetry_updates_speed() -> anyhow::Result<()> {
        let (vehicle, fake) = connected_vehicle(default_config()).await?;
        let (_token, mut received) = message_channel(&vehicle, Some(MessageId::PositionUpdate));

        fake.notify(vec![0x01]);
        fake.notify(vec![0x01, 0x7f]);
        fake.notify(position_frame(17, 36, 612));

        assert_matches!(
            received.recv().await,
            Some(VehicleMessage::Telemetry(Telemetry::PositionUpdate(update))) if update.piece == 36
        );
        assert_eq!(612, vehicle.speed());
        Ok(())
    }

    #[tokio::test]
    async fn disconnect_reports_prior_state_and_removes_speed_listener() -> anyhow::Result<()> {
        let (vehicle, _fake) = connected_vehicle(default_config()).await?;

        assert_eq!(ConnectionState::Connected, vehicle.disconnect().await?);
        assert_eq!(ConnectionState::Disconnected, vehicle.state());
        assert_eq!(0, vehicle.listener_count());
        assert_eq!(ConnectionState::Disconnected, vehicle.disconnect().await?);
        assert_matches!(vehicle.set_speed(300), Err(VehicleError::NotConnected));
        Ok(())
    }

    #[tokio::test]
    async fn disconnect_flushes_queued_commands() -> anyhow::Result<()> {
        let (vehicle, fake) = connected_vehicle(default_config()).await?;

        vehicle.set_speed(0)?;
        vehicle.disconnect().await?;

        assert_eq!(
            Some(&Command::SetSpeed(SetSpeed::builder().speed(0).build()).encode()),
            fake.written().last()
        );
        Ok(())
    }

    #[tokio::test]
    async fn session_reconnects_after_disconnect() -> anyhow::Result<()> {
        let (vehicle, fake) = connected_vehicle(default_config()).await?;
        vehicle.disconnect().await?;

        vehicle.connect().await?;

        assert!(vehicle.is_connected());
        assert_eq!(8, fake.written().len());
        assert_eq!(1, vehicle.listener_count());
        Ok(())
    }
}
