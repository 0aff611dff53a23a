//! Bookmark model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::UserId;

/// Identifier of a stored bookmark row.
///
/// Ids are generated by the store. The table may use `uuid` or `bigint`
/// keys, so both JSON strings and numbers are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BookmarkId(String);

impl BookmarkId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookmarkId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for BookmarkId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(value) => Self(value),
            RawId::Number(value) => Self(value.to_string()),
        })
    }
}

/// A bookmark row as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Store-generated identifier
    pub id: BookmarkId,
    /// Target URL
    pub url: String,
    /// Display title
    pub title: String,
    /// Insert timestamp assigned by the store
    pub created_at: DateTime<Utc>,
    /// Owning user
    pub user_id: UserId,
}

/// Payload for creating a bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBookmark {
    pub url: String,
    pub title: String,
    pub user_id: UserId,
}

impl NewBookmark {
    /// Build a create payload from raw form input.
    ///
    /// Both fields are trimmed; returns `None` when either is empty.
    pub fn from_input(url: &str, title: &str, owner: &UserId) -> Option<Self> {
        let url = url.trim();
        let title = title.trim();
        if url.is_empty() || title.is_empty() {
            return None;
        }

        Some(Self {
            url: url.to_string(),
            title: title.to_string(),
            user_id: owner.clone(),
        })
    }
}
