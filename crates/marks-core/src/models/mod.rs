//! Data models for marks

mod bookmark;
mod change;
mod identity;

pub use bookmark::{Bookmark, BookmarkId, NewBookmark};
pub use change::{ChangeEvent, ChangeKind};
pub use identity::{Identity, UserId};
