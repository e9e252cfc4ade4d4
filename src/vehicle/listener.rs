use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::codec::{MessageId, VehicleMessage};

/// Callback invoked with every matching message on a session.
///
/// Listeners run on the session's delivery task and must return quickly.
pub(crate) type Listener = Arc<dyn Fn(&VehicleMessage) + Send + Sync>;

/// Handle returned by listener registration, used to remove the listener.
///
/// Listeners are registered as closures; the stored callback type stays
/// internal to the crate.
///
/// ```compile_fail
/// use overdrive::Listener;
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ListenerToken(u64);

struct ListenerEntry {
    token: ListenerToken,
    filter: Option<MessageId>,
    listener: Listener,
}

/// Listeners registered on one vehicle session.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_token: AtomicU64,
    entries: Mutex<Vec<ListenerEntry>>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    pub(crate) fn add(&self, filter: Option<MessageId>, listener: Listener) -> ListenerToken {
        let token = ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.lock().push(ListenerEntry {
            token,
            filter,
            listener,
        });
        token
    }

    /// Removes a listener; returns whether it was still registered.
    pub(crate) fn remove(&self, token: ListenerToken) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.token != token);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Invokes every listener whose filter matches `message`, in registration
    /// order.
    ///
    /// Listeners are collected before any is called, so a listener may add or
    /// remove registrations, itself included.
    pub(crate) fn dispatch(&self, message: &VehicleMessage) {
        let message_id = message.message_id();
        let matching: Vec<Listener> = self
            .lock()
            .iter()
            .filter(|entry| entry.filter.is_none_or(|filter| filter == message_id))
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        for listener in matching {
            listener(message);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ListenerEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
