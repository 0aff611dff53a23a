//! Current identity and the identity-change subscription.

use crate::backend::{AuthService, IdentitySubscription};
use crate::models::{Identity, UserId};

/// What an identity transition means for the bookmark state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityTransition {
    SignedOut,
    /// Same user as before (for example a token refresh).
    Refreshed(Identity),
    /// A different user, or the first sign-in.
    OwnerChanged(Identity),
}

#[derive(Default)]
pub struct SessionStore {
    identity: Option<Identity>,
    initialized: bool,
    changes: Option<IdentitySubscription>,
}

impl SessionStore {
    pub const fn new() -> Self {
        Self {
            identity: None,
            initialized: false,
            changes: None,
        }
    }

    /// Subscribe to transitions, then ask for the current identity.
    ///
    /// A failing identity check is logged and treated as signed out.
    pub async fn initialize(&mut self, auth: &dyn AuthService) -> Option<Identity> {
        self.changes = Some(auth.on_identity_change());

        self.identity = match auth.current_identity().await {
            Ok(identity) => identity,
            Err(error) => {
                tracing::error!("Failed to read current session: {}", error);
                None
            }
        };
        self.initialized = true;
        self.identity.clone()
    }

    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn owner(&self) -> Option<&UserId> {
        self.identity.as_ref().map(|identity| &identity.id)
    }

    /// Record a transition delivered by the auth service.
    pub fn apply(&mut self, next: Option<Identity>) -> IdentityTransition {
        let previous_owner = self.identity.take().map(|identity| identity.id);
        self.identity.clone_from(&next);
        self.initialized = true;

        match next {
            None => IdentityTransition::SignedOut,
            Some(identity) if previous_owner.as_ref() == Some(&identity.id) => {
                IdentityTransition::Refreshed(identity)
            }
            Some(identity) => IdentityTransition::OwnerChanged(identity),
        }
    }

    pub const fn is_listening(&self) -> bool {
        self.changes.is_some()
    }

    pub fn changes_mut(&mut self) -> Option<&mut IdentitySubscription> {
        self.changes.as_mut()
    }

    /// Drop the identity-change subscription.
    pub fn release(&mut self) {
        if let Some(changes) = self.changes.take() {
            changes.unsubscribe();
        }
    }
}
