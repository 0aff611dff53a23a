//! Change feed subscription scoped to the current owner.

use crate::backend::{ChangeFeed, ChangeSubscription};
use crate::models::UserId;

/// Lifecycle of the change feed subscription.
///
/// `Active` means the feed accepted the subscription. A channel join the
/// server later refuses ends the subscription, which the controller sees as
/// a closed feed and turns back into `Unsubscribed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListenerState {
    #[default]
    Unsubscribed,
    Subscribing,
    Active,
}

#[derive(Default)]
pub struct ChangeStreamListener {
    state: ListenerState,
    owner: Option<UserId>,
    subscription: Option<ChangeSubscription>,
}

impl ChangeStreamListener {
    pub const fn new() -> Self {
        Self {
            state: ListenerState::Unsubscribed,
            owner: None,
            subscription: None,
        }
    }

    pub const fn state(&self) -> ListenerState {
        self.state
    }

    pub const fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    pub fn is_active_for(&self, owner: &UserId) -> bool {
        self.state == ListenerState::Active && self.owner.as_ref() == Some(owner)
    }

    /// Subscribe to `owner`'s rows, tearing down any other subscription first.
    ///
    /// A failed subscribe is logged and leaves the listener unsubscribed.
    pub async fn start(&mut self, feed: &dyn ChangeFeed, table: &str, owner: &UserId) {
        if self.is_active_for(owner) {
            return;
        }
        self.stop();

        self.state = ListenerState::Subscribing;
        match feed.subscribe(table, owner).await {
            Ok(subscription) => {
                tracing::debug!(owner = %owner, table, "Listening for bookmark changes");
                self.subscription = Some(subscription);
                self.owner = Some(owner.clone());
                self.state = ListenerState::Active;
            }
            Err(error) => {
                tracing::error!("Failed to subscribe to bookmark changes: {}", error);
                self.state = ListenerState::Unsubscribed;
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.owner = None;
        self.state = ListenerState::Unsubscribed;
    }

    /// The feed ended on its own.
    pub fn mark_closed(&mut self) {
        tracing::warn!("Bookmark change feed closed");
        self.stop();
    }

    pub fn subscription_mut(&mut self) -> Option<&mut ChangeSubscription> {
        self.subscription.as_mut()
    }
}
