use std::future::pending;
use std::time::Duration;

use derive_more::Display;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::trace;

use crate::codec::{Telemetry, VehicleMessage};
use crate::error::VehicleError;
use crate::vehicle::{ListenerToken, Vehicle};

/// Why a command stopped consuming telemetry.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
pub(crate) enum StopReason {
    #[display("reached limit ({_0})")]
    ReachedLimit(usize),
    #[display("duration elapsed")]
    Elapsed,
    #[display("interrupted")]
    Interrupted,
}

impl StopReason {
    /// Machine-readable name used in JSON output.
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::ReachedLimit(_) => "reached_limit",
            Self::Elapsed => "elapsed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// JSON line written for each telemetry message and for the final summary.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum FeedRecord<'a> {
    Telemetry {
        index: usize,
        #[serde(flatten)]
        telemetry: &'a Telemetry,
    },
    Summary {
        stopped: &'static str,
        received: usize,
    },
}

/// Telemetry received from one vehicle, buffered for a command loop.
#[derive(Debug)]
pub(crate) struct TelemetryFeed {
    receiver: mpsc::UnboundedReceiver<Telemetry>,
    token: ListenerToken,
}

impl TelemetryFeed {
    /// Starts buffering every telemetry message `vehicle` receives.
    ///
    /// Attach before connecting to see the frames sent during the handshake.
    pub(crate) fn attach(vehicle: &Vehicle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let token = vehicle.add_listener(None, move |message| {
            let VehicleMessage::Telemetry(telemetry) = message else {
                return;
            };
            if sender.send(telemetry.clone()).is_err() {
                trace!("telemetry feed closed");
            }
        });
        Self { receiver, token }
    }

    pub(crate) fn detach(self, vehicle: &Vehicle) {
        vehicle.remove_listener(self.token);
    }

    /// Hands telemetry to `on_message` until `limit` messages were handled,
    /// `deadline` elapses or Ctrl+C is pressed.
    ///
    /// `on_message` receives a one-based index with each message.
    pub(crate) async fn pump<F>(
        &mut self,
        limit: Option<usize>,
        deadline: Option<Duration>,
        mut on_message: F,
    ) -> anyhow::Result<(usize, StopReason)>
    where
        F: FnMut(usize, &Telemetry) -> anyhow::Result<()>,
    {
        let mut received = 0;
        if limit == Some(0) {
            return Ok((received, StopReason::ReachedLimit(0)));
        }

        let elapsed = async {
            match deadline {
                Some(deadline) => sleep(deadline).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(elapsed);
        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        let stop_reason = loop {
            tokio::select! {
                signal = &mut interrupted => {
                    signal.map_err(|source| VehicleError::CtrlC { source })?;
                    break StopReason::Interrupted;
                }
                () = &mut elapsed => break StopReason::Elapsed,
                Some(telemetry) = self.receiver.recv() => {
                    received += 1;
                    on_message(received, &telemetry)?;
                    if let Some(limit) = limit.filter(|limit| received >= *limit) {
                        break StopReason::ReachedLimit(limit);
                    }
                }
            }
        };

        Ok((received, stop_reason))
    }
}
