//! Typed publish/subscribe for adapter lifecycle events.
//!
//! Listeners are keyed by event kind and called in subscription order.
//! Publishing snapshots the listener list and calls it outside the lock, so a
//! listener may subscribe, unsubscribe or trigger further events without
//! deadlocking. Listeners run on the publisher's task and must not block.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use keyway_proto::WalletPublicKey;

use crate::{WalletError, readiness::ReadyState};

/// Event discriminant used for subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// A wallet identity was established or replaced
    Connect,
    /// The adapter disconnected
    Disconnect,
    /// An operation failed
    Error,
    /// Readiness changed
    ReadyStateChange,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Connect, Self::Disconnect, Self::Error, Self::ReadyStateChange];
}

/// Adapter lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// Connected as this account
    Connect(WalletPublicKey),
    /// Disconnected
    Disconnect,
    /// An operation failed with this error (it was also returned)
    Error(WalletError),
    /// Readiness changed to this state
    ReadyStateChange(ReadyState),
}

impl AdapterEvent {
    /// Discriminant of this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connect(_) => EventKind::Connect,
            Self::Disconnect => EventKind::Disconnect,
            Self::Error(_) => EventKind::Error,
            Self::ReadyStateChange(_) => EventKind::ReadyStateChange,
        }
    }
}

/// Event callback.
pub type Listener = Arc<dyn Fn(&AdapterEvent) + Send + Sync>;

/// Handle returned by [`EventChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Event bus: event kind to an ordered list of listeners.
#[derive(Default)]
pub struct EventChannel {
    listeners: Mutex<BTreeMap<EventKind, Vec<(SubscriptionId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventChannel {
    /// Empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events of `kind`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        listener: impl Fn(&AdapterEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().entry(kind).or_default().push((id, Arc::new(listener)));
        id
    }

    /// Register one listener for every kind. The returned id removes all of
    /// the registrations at once.
    pub fn subscribe_all(
        &self,
        listener: impl Fn(&AdapterEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(listener);
        let mut listeners = self.lock();
        for kind in EventKind::ALL {
            listeners.entry(kind).or_default().push((id, Arc::clone(&listener)));
        }
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for entries in self.lock().values_mut() {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
        }
        removed
    }

    /// Deliver `event` to every listener of its kind.
    pub fn publish(&self, event: &AdapterEvent) {
        let snapshot: Vec<Listener> = self
            .lock()
            .get(&event.kind())
            .map(|entries| entries.iter().map(|(_, listener)| Arc::clone(listener)).collect())
            .unwrap_or_default();

        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<EventKind, Vec<(SubscriptionId, Listener)>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<EventKind, usize> =
            self.lock().iter().map(|(kind, entries)| (*kind, entries.len())).collect();
        f.debug_struct("EventChannel").field("listeners", &counts).finish()
    }
}
