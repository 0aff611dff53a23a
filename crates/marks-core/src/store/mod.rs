//! Bookmark table access through Supabase PostgREST.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder};
use thiserror::Error;

use crate::backend::{AccessTokenSource, RecordStore};
use crate::config::ClientConfig;
use crate::models::{Bookmark, BookmarkId, NewBookmark, UserId};
use crate::util::parse_api_error;

const SINGLE_OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Store API error: {0}")]
    Api(String),
    #[error("Invalid store payload: {0}")]
    InvalidPayload(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// PostgREST client for the bookmark table.
#[derive(Clone)]
pub struct SupabaseRecordStore {
    table_url: String,
    anon_key: String,
    client: Client,
    tokens: Arc<dyn AccessTokenSource>,
}

impl SupabaseRecordStore {
    pub fn new(config: &ClientConfig, tokens: Arc<dyn AccessTokenSource>) -> StoreResult<Self> {
        Ok(Self {
            table_url: format!("{}/{}", config.rest_url(), config.table()),
            anon_key: config.anon_key().to_string(),
            client: Client::builder().build()?,
            tokens,
        })
    }

    /// Attach `apikey` and the bearer token. Without a session the anon key
    /// is sent, and row-level security decides what is visible.
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .tokens
            .access_token()
            .await
            .unwrap_or_else(|| self.anon_key.clone());
        request.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<reqwest::Response> {
        let response = self.authorized(request).await.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api(parse_api_error(status, &body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl RecordStore for SupabaseRecordStore {
    async fn list_bookmarks(&self, owner: &UserId) -> StoreResult<Vec<Bookmark>> {
        let request = self.client.get(&self.table_url).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{owner}")),
            ("order", "created_at.desc".to_string()),
        ]);

        let bookmarks = self.send(request).await?.json::<Vec<Bookmark>>().await?;
        tracing::debug!(count = bookmarks.len(), "Fetched bookmarks");
        Ok(bookmarks)
    }

    async fn insert_bookmark(&self, bookmark: &NewBookmark) -> StoreResult<Bookmark> {
        let request = self
            .client
            .post(&self.table_url)
            .query(&[("select", "*")])
            .header("Prefer", "return=representation")
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT_MEDIA_TYPE))
            .json(bookmark);

        let stored = self.send(request).await?.json::<Bookmark>().await?;
        if stored.user_id != bookmark.user_id {
            return Err(StoreError::InvalidPayload(
                "stored bookmark belongs to a different owner".to_string(),
            ));
        }
        Ok(stored)
    }

    async fn delete_bookmark(&self, id: &BookmarkId, owner: &UserId) -> StoreResult<u64> {
        let request = self
            .client
            .delete(&self.table_url)
            .query(&[
                ("id", format!("eq.{id}")),
                ("user_id", format!("eq.{owner}")),
            ])
            .header("Prefer", "return=representation");

        let deleted = self.send(request).await?.json::<Vec<serde_json::Value>>().await?;
        Ok(u64::try_from(deleted.len()).unwrap_or(u64::MAX))
    }
}
