//! Local view-state synchronization.
//!
//! [`BookmarkApp`] reconciles an initial fetch of the signed-in user's
//! bookmarks with the live change feed, and applies the user's own writes to
//! the cache once the store confirms them.

mod cache;
mod context;
mod controller;
mod listener;
mod session;
mod state;

pub use cache::BookmarkList;
pub use context::ClientContext;
pub use controller::{AppEvent, BookmarkApp, LoadOutcome};
pub use listener::{ChangeStreamListener, ListenerState};
pub use session::{IdentityTransition, SessionStore};
pub use state::{ActionError, BookmarkForm, MutationOutcome, ViewState};
