//! Error types for marks-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::realtime::RealtimeError;
use crate::store::StoreError;

/// Result type alias using marks-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in marks-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Supabase auth error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Record store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Realtime change feed error
    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    /// Client configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}
