//! View-facing state: what to render, the add form, and the notice slot.

use thiserror::Error;

use crate::auth::OAuthProvider;
use crate::models::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// The initial identity check has not finished.
    Loading,
    SignedOut,
    SignedIn(Identity),
}

/// Contents of the add-bookmark form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkForm {
    pub url: String,
    pub title: String,
    pub submitting: bool,
}

impl BookmarkForm {
    pub fn clear(&mut self) {
        self.url.clear();
        self.title.clear();
    }

    pub const fn submit_label(&self) -> &'static str {
        if self.submitting {
            "Saving..."
        } else {
            "Add"
        }
    }
}

/// User-visible failure of an action, one per failing backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Failed to sign in with {}.", .0.display_name())]
    AuthStart(OAuthProvider),
    #[error("Failed to sign out.")]
    SignOut,
    #[error("Failed to load bookmarks.")]
    Load,
    #[error("Failed to add bookmark.")]
    Create,
    #[error("Failed to delete bookmark.")]
    Delete,
}

/// Result of a mutation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Input was rejected locally; nothing was sent.
    Skipped,
    Applied,
    /// The backend call failed and a notice was raised.
    Failed,
}
