//! Contracts of the external backend consumed by the bookmark client.
//!
//! The Supabase implementations live in [`crate::auth`], [`crate::store`] and
//! [`crate::realtime`]. The app layer only talks to these traits.

use async_trait::async_trait;

use crate::auth::{AuthResult, OAuthProvider};
use crate::models::{Bookmark, BookmarkId, ChangeEvent, Identity, NewBookmark, UserId};
use crate::realtime::RealtimeResult;
use crate::store::StoreResult;
use crate::subscription::Subscription;

/// Identity transition notifications. `None` means signed out.
pub type IdentitySubscription = Subscription<Option<Identity>>;

/// Row change notifications for one owner's bookmarks.
pub type ChangeSubscription = Subscription<ChangeEvent>;

/// Authentication service.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Identity of the current session, if any.
    async fn current_identity(&self) -> AuthResult<Option<Identity>>;

    /// Subscribe to identity transitions. Each transition is delivered once,
    /// in the order it happened.
    fn on_identity_change(&self) -> IdentitySubscription;

    /// Start the provider's OAuth redirect flow, returning to `return_url`.
    async fn begin_oauth_redirect(&self, provider: OAuthProvider, return_url: &str)
        -> AuthResult<()>;

    /// Terminate the current session.
    async fn end_session(&self) -> AuthResult<()>;
}

/// Source of the bearer token used for data requests.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// Current user access token, or `None` when signed out.
    async fn access_token(&self) -> Option<String>;
}

/// Remote bookmark table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All rows owned by `owner`, newest first.
    async fn list_bookmarks(&self, owner: &UserId) -> StoreResult<Vec<Bookmark>>;

    /// Insert a row and return it as stored (with id and timestamp).
    async fn insert_bookmark(&self, bookmark: &NewBookmark) -> StoreResult<Bookmark>;

    /// Delete the row matching both `id` and `owner`. Returns affected rows.
    async fn delete_bookmark(&self, id: &BookmarkId, owner: &UserId) -> StoreResult<u64>;
}

/// Realtime change feed.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to changes on `table` filtered server-side to `owner`.
    async fn subscribe(&self, table: &str, owner: &UserId) -> RealtimeResult<ChangeSubscription>;
}
