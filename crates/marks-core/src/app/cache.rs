//! In-memory bookmark list for the current identity.

use crate::models::{Bookmark, BookmarkId, ChangeEvent};

/// Ordered bookmarks of the signed-in user.
///
/// Newest first right after a reload. Local adds go to the head and remote
/// inserts to the tail; the order is not re-sorted afterwards. Ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkList {
    items: Vec<Bookmark>,
}

impl BookmarkList {
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Replace the whole list with a fresh load.
    pub fn replace(&mut self, bookmarks: Vec<Bookmark>) {
        self.items = bookmarks;
    }

    /// Prepend a bookmark confirmed by the store.
    ///
    /// If the change feed delivered the same row first, that copy is dropped.
    pub fn insert_local(&mut self, bookmark: Bookmark) {
        self.items.retain(|existing| existing.id != bookmark.id);
        self.items.insert(0, bookmark);
    }

    pub fn remove_local(&mut self, id: &BookmarkId) {
        self.items.retain(|existing| &existing.id != id);
    }

    /// Merge a change feed event. Safe to apply the same event twice.
    pub fn apply_remote_event(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Insert(bookmark) => {
                if !self.contains(&bookmark.id) {
                    self.items.push(bookmark);
                }
            }
            ChangeEvent::Update(bookmark) => {
                if let Some(existing) = self.items.iter_mut().find(|item| item.id == bookmark.id) {
                    *existing = bookmark;
                }
            }
            ChangeEvent::Delete { id } => self.remove_local(&id),
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    pub fn get(&self, id: &BookmarkId) -> Option<&Bookmark> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bookmark> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Bookmark] {
        &self.items
    }
}

impl<'a> IntoIterator for &'a BookmarkList {
    type Item = &'a Bookmark;
    type IntoIter = std::slice::Iter<'a, Bookmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
