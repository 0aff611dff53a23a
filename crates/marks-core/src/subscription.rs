//! Explicit subscription handles for push-style notifications.
//!
//! A [`Registry`] fans values out to every live [`Subscription`]. Dropping a
//! subscription (or calling [`Subscription::unsubscribe`]) removes it from the
//! registry, so `subscriber_count` always reflects handles still held.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

struct RegistryState<T> {
    next_id: u64,
    senders: BTreeMap<u64, mpsc::UnboundedSender<T>>,
}

struct RegistryInner<T> {
    state: Mutex<RegistryState<T>>,
}

impl<T> RegistryInner<T> {
    fn lock(&self) -> MutexGuard<'_, RegistryState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fan-out point for notifications of type `T`.
pub struct Registry<T> {
    inner: Arc<RegistryInner<T>>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                state: Mutex::new(RegistryState {
                    next_id: 0,
                    senders: BTreeMap::new(),
                }),
            }),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.senders.insert(id, sender);

        Subscription {
            receiver,
            registration: Some(Registration {
                id,
                registry: Arc::downgrade(&self.inner),
            }),
        }
    }

    /// Number of subscriptions still held by someone.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.inner.lock();
        state.senders.retain(|_, sender| !sender.is_closed());
        state.senders.len()
    }
}

impl<T: Clone> Registry<T> {
    /// Deliver `value` to every live subscriber, in registration order.
    pub fn publish(&self, value: &T) {
        let mut state = self.inner.lock();
        state
            .senders
            .retain(|_, sender| sender.send(value.clone()).is_ok());
    }
}

struct Registration<T> {
    id: u64,
    registry: Weak<RegistryInner<T>>,
}

/// Receiving end of a subscription.
///
/// Values are delivered in publish order. The handle must be kept alive for
/// as long as notifications are wanted.
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<T>,
    registration: Option<Registration<T>>,
}

impl<T> Subscription<T> {
    /// Wrap a plain channel receiver, for producers that watch the sender's
    /// `closed()` future instead of using a [`Registry`].
    pub fn from_receiver(receiver: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            receiver,
            registration: None,
        }
    }

    /// Wait for the next value. Returns `None` once the producer is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take a value that is already queued, if any.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Release the subscription. Equivalent to dropping it.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(registration) = self.registration.take() {
            if let Some(registry) = registration.registry.upgrade() {
                registry.lock().senders.remove(&registration.id);
            }
        }
    }
}
