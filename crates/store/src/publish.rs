//! Publish/subscribe hub for store snapshots.
//!
//! Every publication on every [`Channel`] goes through one FIFO queue, so all
//! observers see publications in a single total order. Observers are plain
//! callbacks invoked synchronously in registration order with no lock held:
//! a callback may call back into the store, subscribe, or drop its own
//! [`Subscription`]. Anything it publishes is queued behind the delivery in
//! progress.
//!
//! A publication is delivered before `drain` returns unless another thread is
//! already draining, in which case that thread delivers it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

/// The streams a store publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Catalog,
    Cart,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog => f.write_str("catalog"),
            Self::Cart => f.write_str("cart"),
        }
    }
}

/// Identifies one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Observer<T> = Box<dyn FnMut(&T) + Send>;

struct Slot<T> {
    id: SubscriptionId,
    channel: Channel,
    /// Sequence number of the welcome delivery queued at registration.
    joined: u64,
    /// `None` while the observer is being invoked.
    observer: Option<Observer<T>>,
}

struct Delivery<T> {
    seq: u64,
    channel: Channel,
    value: T,
    /// Welcome deliveries go to the new subscriber only.
    target: Option<SubscriptionId>,
}

impl<T> Delivery<T> {
    fn reaches(&self, slot: &Slot<T>) -> bool {
        match self.target {
            Some(id) => slot.id == id,
            None => slot.channel == self.channel && slot.joined < self.seq,
        }
    }
}

struct HubState<T> {
    slots: Vec<Slot<T>>,
    queue: VecDeque<Delivery<T>>,
    next_seq: u64,
    next_id: u64,
    delivering: bool,
}

impl<T> HubState<T> {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn take_observer(&mut self, id: SubscriptionId) -> Option<Observer<T>> {
        self.slots
            .iter_mut()
            .find(|slot| slot.id == id)
            .and_then(|slot| slot.observer.take())
    }

    /// Put an observer back after invoking it. Returns it if the slot was
    /// removed in the meantime so the caller can drop it outside the lock.
    fn restore_observer(&mut self, id: SubscriptionId, observer: Observer<T>) -> Option<Observer<T>> {
        match self.slots.iter_mut().find(|slot| slot.id == id) {
            Some(slot) => {
                slot.observer = Some(observer);
                None
            }
            None => Some(observer),
        }
    }

    fn remove(&mut self, id: SubscriptionId) -> Option<Slot<T>> {
        let index = self.slots.iter().position(|slot| slot.id == id)?;
        Some(self.slots.remove(index))
    }
}

/// Type-erased view of a hub that a [`Subscription`] can unregister from.
trait Registry: Send + Sync {
    fn unregister(&self, id: SubscriptionId);
}

impl<T: Send> Registry for Mutex<HubState<T>> {
    fn unregister(&self, id: SubscriptionId) {
        let removed = self.lock().remove(id);
        if removed.is_some() {
            debug!(subscription = %id, "Observer unsubscribed");
        }
        // Dropped here, after the lock is released: the observer may own
        // other subscriptions whose drop needs the lock.
        drop(removed);
    }
}

/// Handle to a registered observer.
///
/// Dropping the handle, or calling [`Subscription::unsubscribe`], stops all
/// future deliveries to its observer. Other observers are unaffected.
#[must_use = "dropping a Subscription unsubscribes its observer immediately"]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<dyn Registry>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop delivery to this observer.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Observer registry and delivery queue.
pub struct Hub<T> {
    inner: Arc<Mutex<HubState<T>>>,
}

impl<T> Default for Hub<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubState {
                slots: Vec::new(),
                queue: VecDeque::new(),
                next_seq: 0,
                next_id: 0,
                delivering: false,
            })),
        }
    }
}

impl<T: Clone + Send + 'static> Hub<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` on `channel` and queue `current` for it alone.
    ///
    /// The observer receives `current` first and then only publications
    /// queued after this call. Call [`Hub::drain`] afterwards to deliver.
    pub fn subscribe(
        &self,
        channel: Channel,
        current: T,
        observer: impl FnMut(&T) + Send + 'static,
    ) -> Subscription {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        let seq = state.next_seq();

        state.slots.push(Slot {
            id,
            channel,
            joined: seq,
            observer: Some(Box::new(observer)),
        });
        state.queue.push_back(Delivery {
            seq,
            channel,
            value: current,
            target: Some(id),
        });
        drop(state);

        debug!(subscription = %id, %channel, "Observer subscribed");

        let inner: Arc<dyn Registry> = self.inner.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&inner),
        }
    }

    /// Queue `value` for every observer currently registered on `channel`.
    ///
    /// Call [`Hub::drain`] afterwards to deliver.
    pub fn publish(&self, channel: Channel, value: T) {
        let mut state = self.inner.lock();
        let seq = state.next_seq();
        state.queue.push_back(Delivery {
            seq,
            channel,
            value,
            target: None,
        });
        trace!(seq, %channel, "Publication queued");
    }

    /// Number of registered observers on `channel`.
    #[must_use]
    pub fn observer_count(&self, channel: Channel) -> usize {
        self.inner
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.channel == channel)
            .count()
    }

    /// Deliver queued publications in order.
    ///
    /// Returns immediately if a delivery is already in progress (including a
    /// reentrant call from inside an observer); the active drain picks up
    /// whatever was queued.
    pub fn drain(&self) {
        {
            let mut state = self.inner.lock();
            if state.delivering {
                return;
            }
            state.delivering = true;
        }
        let _guard = DrainGuard { hub: &self.inner };

        loop {
            let (delivery, targets) = {
                let mut state = self.inner.lock();
                let Some(delivery) = state.queue.pop_front() else {
                    state.delivering = false;
                    return;
                };
                let targets: Vec<SubscriptionId> = state
                    .slots
                    .iter()
                    .filter(|slot| delivery.reaches(slot))
                    .map(|slot| slot.id)
                    .collect();
                (delivery, targets)
            };

            trace!(seq = delivery.seq, channel = %delivery.channel, observers = targets.len(), "Delivering");

            for id in targets {
                let Some(mut observer) = self.inner.lock().take_observer(id) else {
                    continue;
                };
                observer(&delivery.value);
                let orphan = self.inner.lock().restore_observer(id, observer);
                drop(orphan);
            }
        }
    }
}

/// Releases the delivering flag if an observer panics mid-drain.
///
/// The panicking observer was taken out of its slot and is never restored,
/// so its slot is unregistered here. Only the active drain takes observers,
/// so an empty slot can only belong to the observer that panicked.
struct DrainGuard<'a, T> {
    hub: &'a Mutex<HubState<T>>,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.hub.lock();
            state.delivering = false;
            state.slots.retain(|slot| slot.observer.is_some());
        }
    }
}
