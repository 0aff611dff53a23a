//! Change feed events

use serde::{Deserialize, Serialize};

use super::{Bookmark, BookmarkId};

/// Kind of row change delivered by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row change for the current owner's bookmarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Bookmark),
    Update(Bookmark),
    /// Deletes only carry the primary key of the old row.
    Delete {
        id: BookmarkId,
    },
}

impl ChangeEvent {
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert(_) => ChangeKind::Insert,
            Self::Update(_) => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &BookmarkId {
        match self {
            Self::Insert(bookmark) | Self::Update(bookmark) => &bookmark.id,
            Self::Delete { id } => id,
        }
    }
}
