//! Client configuration.
//!
//! Provides a unified `ClientConfig` used by marks clients to discover the
//! Supabase project (auth, PostgREST, realtime) and the bookmark table.

use std::fmt;

use thiserror::Error;
use url::Url;

use crate::auth::OAuthProvider;
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_BOOKMARKS_TABLE: &str = "bookmarks";
pub const DEFAULT_REDIRECT_URL: &str = "http://127.0.0.1:8976/callback";

const REALTIME_PROTOCOL_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Supabase is not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY.")]
    NotConfigured,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Public Supabase project settings.
///
/// Only the anon key is held here; it is safe to ship. Session tokens live in
/// the session persistence layer.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    supabase_url: String,
    supabase_anon_key: String,
    table: String,
    provider: OAuthProvider,
    redirect_url: String,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &"[REDACTED]")
            .field("table", &self.table)
            .field("provider", &self.provider)
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(supabase_url: impl AsRef<str>, anon_key: impl AsRef<str>) -> ConfigResult<Self> {
        let supabase_url = normalize_project_url(supabase_url.as_ref())?;
        let supabase_anon_key = anon_key.as_ref().trim().to_string();
        if supabase_anon_key.is_empty() {
            return Err(ConfigError::Invalid(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            table: DEFAULT_BOOKMARKS_TABLE.to_string(),
            provider: OAuthProvider::default(),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
        })
    }

    /// Build a config from optional values.
    ///
    /// Both missing means "not configured" (`Ok(None)`); only one of them set
    /// is an error.
    pub fn from_optional(
        supabase_url: Option<String>,
        anon_key: Option<String>,
    ) -> ConfigResult<Option<Self>> {
        match (
            normalize_text_option(supabase_url),
            normalize_text_option(anon_key),
        ) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Self::new(url, anon_key).map(Some),
            _ => Err(ConfigError::NotConfigured),
        }
    }

    /// Read `SUPABASE_URL` / `SUPABASE_ANON_KEY` from the environment.
    pub fn from_env() -> ConfigResult<Option<Self>> {
        Self::from_optional(
            std::env::var("SUPABASE_URL").ok(),
            std::env::var("SUPABASE_ANON_KEY").ok(),
        )
    }

    pub fn with_table(mut self, table: impl AsRef<str>) -> ConfigResult<Self> {
        let table = table.as_ref().trim();
        if table.is_empty()
            || !table
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "table name '{table}' must be a plain identifier"
            )));
        }
        self.table = table.to_string();
        Ok(self)
    }

    #[must_use]
    pub const fn with_provider(mut self, provider: OAuthProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_redirect_url(mut self, redirect_url: impl AsRef<str>) -> ConfigResult<Self> {
        let redirect_url = redirect_url.as_ref().trim();
        if !is_http_url(redirect_url) {
            return Err(ConfigError::Invalid(
                "redirect URL must include http:// or https://".to_string(),
            ));
        }
        self.redirect_url = redirect_url.to_string();
        Ok(self)
    }

    pub fn supabase_url(&self) -> &str {
        &self.supabase_url
    }

    pub fn anon_key(&self) -> &str {
        &self.supabase_anon_key
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub const fn provider(&self) -> OAuthProvider {
        self.provider
    }

    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }

    /// Websocket endpoint for Supabase Realtime (`ws`/`wss` scheme).
    pub fn realtime_url(&self) -> ConfigResult<Url> {
        let websocket_base = if let Some(rest) = self.supabase_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.supabase_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(ConfigError::Invalid(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        };

        let mut url = Url::parse(&format!("{websocket_base}/realtime/v1/websocket"))
            .map_err(|error| ConfigError::Invalid(format!("invalid realtime URL: {error}")))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.supabase_anon_key)
            .append_pair("vsn", REALTIME_PROTOCOL_VERSION);
        Ok(url)
    }
}

/// Normalize a Supabase project URL: trimmed, http(s) only, no trailing slash,
/// and without any `/auth/v1` or `/rest/v1` suffix a user may have pasted.
pub fn normalize_project_url(url: &str) -> ConfigResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(ConfigError::Invalid(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }

    let base = ["/auth/v1", "/rest/v1", "/realtime/v1"]
        .iter()
        .find_map(|suffix| trimmed.strip_suffix(suffix))
        .unwrap_or(trimmed);
    Ok(base.to_string())
}
