//! marks-core - Core library for marks
//!
//! This crate contains the bookmark models, the Supabase auth/storage/realtime
//! clients, and the view-state synchronization logic shared by marks clients.

pub mod app;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod realtime;
pub mod store;
pub mod subscription;
pub mod util;

pub use error::{Error, Result};
pub use models::{Bookmark, BookmarkId, ChangeEvent, Identity, NewBookmark, UserId};
