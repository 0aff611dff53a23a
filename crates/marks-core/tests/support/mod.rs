#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use marks_core::app::{BookmarkApp, ClientContext};
use marks_core::auth::{AuthError, AuthResult, OAuthProvider};
use marks_core::backend::{
    AuthService, ChangeFeed, ChangeSubscription, IdentitySubscription, RecordStore,
};
use marks_core::config::ClientConfig;
use marks_core::realtime::{RealtimeError, RealtimeResult};
use marks_core::store::{StoreError, StoreResult};
use marks_core::subscription::{Registry, Subscription};
use marks_core::{Bookmark, BookmarkId, ChangeEvent, Identity, NewBookmark, UserId};

pub fn ada() -> Identity {
    Identity::new("user-ada", Some("ada@example.com".to_string()))
}

pub fn grace() -> Identity {
    Identity::new("user-grace", Some("grace@example.com".to_string()))
}

pub fn bookmark(id: &str, owner: &Identity) -> Bookmark {
    Bookmark {
        id: BookmarkId::new(id),
        url: format!("https://example.com/{id}"),
        title: format!("Bookmark {id}"),
        created_at: Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap(),
        user_id: owner.id.clone(),
    }
}

pub fn ids(app: &BookmarkApp) -> Vec<String> {
    app.bookmarks()
        .iter()
        .map(|bookmark| bookmark.id.to_string())
        .collect()
}

#[derive(Default)]
pub struct FakeAuth {
    identity: Mutex<Option<Identity>>,
    changes: Registry<Option<Identity>>,
    pub fail_identity: AtomicBool,
    pub fail_redirect: AtomicBool,
    pub fail_end_session: AtomicBool,
    pub redirects: Mutex<Vec<(OAuthProvider, String)>>,
}

impl FakeAuth {
    pub fn signed_in(identity: Identity) -> Self {
        let auth = Self::default();
        *auth.identity.lock().unwrap() = Some(identity);
        auth
    }

    /// Simulate the auth backend completing a sign-in.
    pub fn sign_in_as(&self, identity: Identity) {
        *self.identity.lock().unwrap() = Some(identity.clone());
        self.changes.publish(&Some(identity));
    }

    /// Simulate the session ending outside the client.
    pub fn expire(&self) {
        *self.identity.lock().unwrap() = None;
        self.changes.publish(&None);
    }

    pub fn listener_count(&self) -> usize {
        self.changes.subscriber_count()
    }
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn current_identity(&self) -> AuthResult<Option<Identity>> {
        if self.fail_identity.load(Ordering::SeqCst) {
            return Err(AuthError::Api("identity check failed".to_string()));
        }
        Ok(self.identity.lock().unwrap().clone())
    }

    fn on_identity_change(&self) -> IdentitySubscription {
        self.changes.subscribe()
    }

    async fn begin_oauth_redirect(
        &self,
        provider: OAuthProvider,
        return_url: &str,
    ) -> AuthResult<()> {
        if self.fail_redirect.load(Ordering::SeqCst) {
            return Err(AuthError::Redirect("no browser".to_string()));
        }
        self.redirects
            .lock()
            .unwrap()
            .push((provider, return_url.to_string()));
        Ok(())
    }

    async fn end_session(&self) -> AuthResult<()> {
        if self.fail_end_session.load(Ordering::SeqCst) {
            return Err(AuthError::Api("logout failed".to_string()));
        }
        self.expire();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<Vec<Bookmark>>,
    next_id: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
    pub list_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl FakeStore {
    pub fn with_rows(rows: Vec<Bookmark>) -> Self {
        let store = Self::default();
        *store.rows.lock().unwrap() = rows;
        store
    }

    /// Ids handed out by the next inserts start at `id`.
    pub fn next_id_from(self, id: usize) -> Self {
        self.next_id.store(id, Ordering::SeqCst);
        self
    }

    pub fn remote_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
            + self.insert_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn list_bookmarks(&self, owner: &UserId) -> StoreResult<Vec<Bookmark>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Api("list failed (500)".to_string()));
        }
        let mut rows = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| &row.user_id == owner)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(rows)
    }

    async fn insert_bookmark(&self, bookmark: &NewBookmark) -> StoreResult<Bookmark> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Api("insert failed (500)".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = Bookmark {
            id: BookmarkId::new(id.to_string()),
            url: bookmark.url.clone(),
            title: bookmark.title.clone(),
            created_at: Utc::now(),
            user_id: bookmark.user_id.clone(),
        };
        self.rows.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn delete_bookmark(&self, id: &BookmarkId, owner: &UserId) -> StoreResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Api("delete failed (500)".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| !(&row.id == id && &row.user_id == owner));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct FakeFeed {
    senders: Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>,
    pub fail_subscribe: AtomicBool,
    pub subscriptions: Mutex<Vec<(String, UserId)>>,
}

impl FakeFeed {
    pub fn emit(&self, event: ChangeEvent) {
        self.senders
            .lock()
            .unwrap()
            .retain(|sender| sender.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|sender| !sender.is_closed());
        senders.len()
    }

    /// End every live subscription from the server side, as a refused join does.
    pub fn close_all(&self) {
        self.senders.lock().unwrap().clear();
    }
}

#[async_trait]
impl ChangeFeed for FakeFeed {
    async fn subscribe(&self, table: &str, owner: &UserId) -> RealtimeResult<ChangeSubscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(RealtimeError::Protocol("join rejected".to_string()));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((table.to_string(), owner.clone()));
        let (sender, receiver) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(sender);
        Ok(Subscription::from_receiver(receiver))
    }
}

pub struct Harness {
    pub auth: Arc<FakeAuth>,
    pub store: Arc<FakeStore>,
    pub feed: Arc<FakeFeed>,
    pub app: BookmarkApp,
}

impl Harness {
    pub fn new(auth: FakeAuth, store: FakeStore) -> Self {
        let auth = Arc::new(auth);
        let store = Arc::new(store);
        let feed = Arc::new(FakeFeed::default());
        let config = ClientConfig::new("https://demo.supabase.co", "anon-key").unwrap();
        let context = ClientContext::new(
            config,
            auth.clone(),
            store.clone(),
            feed.clone(),
        );
        Self {
            auth,
            store,
            feed,
            app: BookmarkApp::new(context),
        }
    }

    pub async fn started(auth: FakeAuth, store: FakeStore) -> Self {
        let mut harness = Self::new(auth, store);
        harness.app.start().await;
        harness
    }
}
