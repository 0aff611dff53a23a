use std::io;

use thiserror::Error;

use marks_core::app::ActionError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] marks_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("Bookmark ID cannot be empty")]
    EmptyBookmarkId,
    #[error("Bookmark URL and title cannot be empty")]
    EmptyBookmark,
    #[error("{0}")]
    AmbiguousBookmarkId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Sign-in callback failed: {0}")]
    Callback(String),
    #[error("Not signed in. Run `marks auth login` first.")]
    NotSignedIn,
    #[error(
        "Supabase is not configured. Run `marks config init` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    NotConfigured,
}
