use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::codec::{MessageId, Telemetry};

#[derive(Debug)]
struct PendingEntry {
    id: u64,
    response: MessageId,
    sender: oneshot::Sender<Telemetry>,
}

/// In-flight requests waiting for a response frame, keyed by the awaited
/// message id.
#[derive(Debug, Default)]
pub(crate) struct PendingRequests {
    next_id: AtomicU64,
    entries: Mutex<Vec<PendingEntry>>,
}

impl PendingRequests {
    /// Registers interest in the next `response` frame.
    ///
    /// The returned guard deregisters the request when dropped, whether or not
    /// a response arrived.
    pub(crate) fn register(
        self: &Arc<Self>,
        response: MessageId,
    ) -> (PendingGuard, oneshot::Receiver<Telemetry>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        self.lock().push(PendingEntry {
            id,
            response,
            sender,
        });

        let guard = PendingGuard {
            id,
            requests: Arc::clone(self),
        };
        (guard, receiver)
    }

    /// Hands `telemetry` to the oldest request waiting for its id.
    ///
    /// Returns whether a waiting request consumed it.
    pub(crate) fn resolve(&self, telemetry: &Telemetry) -> bool {
        let message_id = telemetry.message_id();
        let entry = {
            let mut entries = self.lock();
            let Some(position) = entries.iter().position(|entry| entry.response == message_id)
            else {
                return false;
            };
            entries.remove(position)
        };
        entry.sender.send(telemetry.clone()).is_ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|entry| entry.id != id);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deregisters a pending request on drop.
#[derive(Debug)]
pub(crate) struct PendingGuard {
    id: u64,
    requests: Arc<PendingRequests>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.requests.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn resolve_matches_the_awaited_response_only() {
        let requests = Arc::new(PendingRequests::default());
        let (_guard, mut receiver) = requests.register(MessageId::VersionResponse);

        assert!(!requests.resolve(&Telemetry::BatteryLevelResponse(3_800)));
        assert_matches!(receiver.try_recv(), Err(oneshot::error::TryRecvError::Empty));

        assert!(requests.resolve(&Telemetry::VersionResponse(0x2e2f)));
        assert_eq!(Ok(Telemetry::VersionResponse(0x2e2f)), receiver.try_recv());
        assert_eq!(0, requests.len());
    }

    #[test]
    fn oldest_request_is_resolved_first() {
        let requests = Arc::new(PendingRequests::default());
        let (_first_guard, mut first) = requests.register(MessageId::PingResponse);
        let (_second_guard, mut second) = requests.register(MessageId::PingResponse);

        requests.resolve(&Telemetry::PingResponse);

        assert_eq!(Ok(Telemetry::PingResponse), first.try_recv());
        assert_matches!(second.try_recv(), Err(oneshot::error::TryRecvError::Empty));
        assert_eq!(1, requests.len());
    }

    #[test]
    fn dropping_the_guard_deregisters_the_request() {
        let requests = Arc::new(PendingRequests::default());
        let (guard, _receiver) = requests.register(MessageId::BatteryLevelResponse);
        assert_eq!(1, requests.len());

        drop(guard);

        assert_eq!(0, requests.len());
        assert!(!requests.resolve(&Telemetry::BatteryLevelResponse(3_800)));
    }
}
