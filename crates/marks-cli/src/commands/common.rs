use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use marks_core::app::{BookmarkApp, BookmarkList, ClientContext, MutationOutcome};
use marks_core::auth::{RedirectLauncher, SupabaseAuth};
use marks_core::config::ClientConfig;
use marks_core::{Bookmark, BookmarkId, Identity};

use crate::auth::{BrowserLauncher, KeyringSessionStore};
use crate::callback::CallbackServer;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(180);
const SHORT_ID_LENGTH: usize = 8;
pub const EMPTY_LIST_MESSAGE: &str = "No bookmarks yet - you're all caught up.";

/// Supabase clients for one CLI profile.
pub struct Runtime {
    pub profile_name: String,
    pub config: ClientConfig,
    pub context: ClientContext,
    pub auth: Arc<SupabaseAuth<KeyringSessionStore>>,
}

impl Runtime {
    pub fn open(profile: Option<&str>) -> Result<Self, CliError> {
        Self::open_with_launcher(profile, Arc::new(BrowserLauncher))
    }

    pub fn open_with_launcher(
        profile: Option<&str>,
        launcher: Arc<dyn RedirectLauncher>,
    ) -> Result<Self, CliError> {
        let profiles = CliProfilesConfig::load().map_err(CliError::Config)?;
        let profile_name = profiles.resolve_profile_name(profile);
        let config = profiles
            .profile(&profile_name)
            .cloned()
            .unwrap_or_default()
            .client_config()
            .map_err(marks_core::Error::from)?
            .ok_or(CliError::NotConfigured)?;

        let (context, auth) = ClientContext::supabase(
            config.clone(),
            KeyringSessionStore::new(&profile_name),
            launcher,
        )?;
        tracing::debug!(profile = %profile_name, "Opened Supabase clients");

        Ok(Self {
            profile_name,
            config,
            context,
            auth,
        })
    }

    /// Start the app and require a signed-in identity with a loaded list.
    pub async fn signed_in_app(&self, live_updates: bool) -> Result<BookmarkApp, CliError> {
        let mut app = BookmarkApp::new(self.context.clone());
        if !live_updates {
            app = app.without_live_updates();
        }
        app.start().await;

        if app.identity().is_none() {
            app.teardown();
            return Err(CliError::NotSignedIn);
        }
        if let Some(notice) = app.notice() {
            app.teardown();
            return Err(CliError::Action(notice));
        }
        Ok(app)
    }

    /// Run the browser sign-in and wait for the redirect to come back.
    pub async fn browser_sign_in(&self, app: &mut BookmarkApp) -> Result<Identity, CliError> {
        let server = CallbackServer::bind(self.config.redirect_url()).await?;
        tracing::debug!(addr = ?server.local_addr().ok(), "Waiting for sign-in callback");

        if app.sign_in().await != MutationOutcome::Applied {
            return Err(app.notice().map_or_else(
                || CliError::Auth("sign-in did not start".to_string()),
                CliError::Action,
            ));
        }

        let code = server.wait_for_code(SIGN_IN_TIMEOUT).await?;
        self.auth
            .complete_oauth_redirect(&code)
            .await
            .map_err(|error| CliError::Auth(error.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct BookmarkListItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub created_at: String,
    pub created_at_local: String,
    pub relative_time: String,
}

pub fn bookmark_to_list_item(bookmark: &Bookmark) -> BookmarkListItem {
    let now_ms = Utc::now().timestamp_millis();
    BookmarkListItem {
        id: bookmark.id.to_string(),
        url: bookmark.url.clone(),
        title: bookmark.title.clone(),
        created_at: bookmark.created_at.to_rfc3339(),
        created_at_local: format_local_timestamp(bookmark.created_at),
        relative_time: format_relative_time(bookmark.created_at.timestamp_millis(), now_ms),
    }
}

pub fn format_bookmark_lines<'a>(bookmarks: impl IntoIterator<Item = &'a Bookmark>) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    bookmarks
        .into_iter()
        .map(|bookmark| {
            let id = bookmark.id.to_string();
            let short_id = id.chars().take(SHORT_ID_LENGTH).collect::<String>();
            let title = truncate(&bookmark.title, 40);
            let relative_time =
                format_relative_time(bookmark.created_at.timestamp_millis(), now_ms);
            format!(
                "{short_id:<8}  {title:<40}  {relative_time:<10}  {}",
                bookmark.url
            )
        })
        .collect()
}

/// Account badge and bookmark count, e.g. `[A] ada@example.com  3 saved`.
pub fn format_header(identity: &Identity, count: usize) -> String {
    format!(
        "[{}] {}  {}",
        identity.initial(),
        identity.display_name(),
        format_count(count)
    )
}

pub fn format_count(count: usize) -> String {
    format!("{count} saved")
}

pub fn print_bookmarks(identity: &Identity, bookmarks: &BookmarkList) {
    println!("{}", format_header(identity, bookmarks.len()));
    if bookmarks.is_empty() {
        println!("{EMPTY_LIST_MESSAGE}");
    }
    for line in format_bookmark_lines(bookmarks) {
        println!("{line}");
    }
}

pub fn format_local_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated = collapsed
            .chars()
            .take(max_chars.saturating_sub(3))
            .collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn normalize_bookmark_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyBookmarkId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Resolve a full id or unique id prefix against the loaded list.
///
/// An id that matches nothing locally is passed through unchanged; the store
/// decides whether it exists.
pub fn resolve_bookmark_id(query: &str, bookmarks: &BookmarkList) -> Result<BookmarkId, CliError> {
    let exact = BookmarkId::new(query);
    if bookmarks.contains(&exact) {
        return Ok(exact);
    }

    let matches = bookmarks
        .iter()
        .filter(|bookmark| bookmark.id.as_str().starts_with(query))
        .map(|bookmark| bookmark.id.clone())
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Ok(exact),
        [single] => Ok(single.clone()),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|id| id.as_str().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousBookmarkId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}
