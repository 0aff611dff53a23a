//! The bookmark client: wires the session store, cache, change listener and
//! action handlers together and drives them from one event loop.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};

use super::cache::BookmarkList;
use super::context::ClientContext;
use super::listener::{ChangeStreamListener, ListenerState};
use super::session::{IdentityTransition, SessionStore};
use super::state::{ActionError, BookmarkForm, MutationOutcome, ViewState};
use crate::models::{Bookmark, BookmarkId, ChangeEvent, Identity, NewBookmark, UserId};
use crate::store::StoreResult;
use crate::subscription::Subscription;

/// A finished background reload, tagged with the owner it was issued for.
#[derive(Debug)]
pub struct LoadOutcome {
    pub owner: UserId,
    pub result: StoreResult<Vec<Bookmark>>,
}

#[derive(Debug)]
pub enum AppEvent {
    Identity(Option<Identity>),
    Change(ChangeEvent),
    Loaded(LoadOutcome),
    FeedClosed,
    AuthClosed,
}

pub struct BookmarkApp {
    context: ClientContext,
    session: SessionStore,
    cache: BookmarkList,
    listener: ChangeStreamListener,
    form: BookmarkForm,
    notice: Option<ActionError>,
    pending_loads: FuturesUnordered<BoxFuture<'static, LoadOutcome>>,
    live_updates: bool,
}

impl BookmarkApp {
    pub fn new(context: ClientContext) -> Self {
        Self {
            context,
            session: SessionStore::new(),
            cache: BookmarkList::new(),
            listener: ChangeStreamListener::new(),
            form: BookmarkForm::default(),
            notice: None,
            pending_loads: FuturesUnordered::new(),
            live_updates: true,
        }
    }

    /// Skip the change feed. For one-shot use where only the initial load
    /// and the user's own writes matter.
    #[must_use]
    pub fn without_live_updates(mut self) -> Self {
        self.live_updates = false;
        self
    }

    /// Resolve the current identity, then load and listen for its bookmarks.
    pub async fn start(&mut self) {
        let identity = self.session.initialize(self.context.auth.as_ref()).await;
        if let Some(identity) = identity {
            self.reload().await;
            self.start_listener(&identity.id).await;
        }
    }

    /// Release every subscription and drop pending reloads.
    pub fn teardown(&mut self) {
        self.session.release();
        self.listener.stop();
        self.pending_loads = FuturesUnordered::new();
    }

    pub const fn context(&self) -> &ClientContext {
        &self.context
    }

    pub fn view_state(&self) -> ViewState {
        if !self.session.is_initialized() {
            return ViewState::Loading;
        }
        self.session
            .identity()
            .map_or(ViewState::SignedOut, |identity| {
                ViewState::SignedIn(identity.clone())
            })
    }

    pub const fn identity(&self) -> Option<&Identity> {
        self.session.identity()
    }

    pub const fn bookmarks(&self) -> &BookmarkList {
        &self.cache
    }

    pub const fn form(&self) -> &BookmarkForm {
        &self.form
    }

    pub const fn notice(&self) -> Option<ActionError> {
        self.notice
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub const fn listener_state(&self) -> ListenerState {
        self.listener.state()
    }

    pub fn pending_load_count(&self) -> usize {
        self.pending_loads.len()
    }

    /// Wait for the next identity transition, change event or finished reload.
    ///
    /// Identity transitions win over everything else that is ready, so a
    /// sign-out always clears state before a stale reload can land. Returns
    /// `None` when there is nothing left to wait for.
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        let Self {
            session,
            listener,
            pending_loads,
            ..
        } = self;
        let auth_open = session.is_listening();
        let feed_open = listener.subscription_mut().is_some();
        let loads_pending = !pending_loads.is_empty();

        tokio::select! {
            biased;
            change = recv_opt(session.changes_mut()), if auth_open => Some(
                change.map_or(AppEvent::AuthClosed, AppEvent::Identity)
            ),
            Some(outcome) = pending_loads.next(), if loads_pending => Some(AppEvent::Loaded(outcome)),
            event = recv_opt(listener.subscription_mut()), if feed_open => Some(
                event.map_or(AppEvent::FeedClosed, AppEvent::Change)
            ),
            else => None,
        }
    }

    pub async fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Identity(next) => self.apply_identity(next).await,
            AppEvent::Change(change) => {
                tracing::debug!(kind = ?change.kind(), id = %change.id(), "Applying remote change");
                self.cache.apply_remote_event(change);
            }
            AppEvent::Loaded(outcome) => {
                self.finish_load(outcome);
            }
            AppEvent::FeedClosed => self.listener.mark_closed(),
            AppEvent::AuthClosed => {
                tracing::warn!("Identity change subscription closed");
                self.session.release();
            }
        }
    }

    /// Process one event. Returns `false` once there is nothing left to wait for.
    pub async fn step(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Process every event that is ready right now without waiting.
    pub async fn drain_ready(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let ready = self.next_event().now_or_never();
            let Some(Some(event)) = ready else {
                return handled;
            };
            self.handle_event(event).await;
            handled += 1;
        }
    }

    /// Fetch the current owner's bookmarks and replace the cache.
    pub async fn reload(&mut self) -> MutationOutcome {
        let Some(owner) = self.session.owner().cloned() else {
            return MutationOutcome::Skipped;
        };

        self.notice = None;
        let result = self.context.store.list_bookmarks(&owner).await;
        self.finish_load(LoadOutcome { owner, result })
    }

    pub async fn sign_in(&mut self) -> MutationOutcome {
        self.notice = None;
        let provider = self.context.config.provider();
        let return_url = self.context.config.redirect_url().to_string();

        match self
            .context
            .auth
            .begin_oauth_redirect(provider, &return_url)
            .await
        {
            Ok(()) => MutationOutcome::Applied,
            Err(error) => {
                tracing::error!(provider = %provider, "Failed to start sign-in: {}", error);
                self.notice = Some(ActionError::AuthStart(provider));
                MutationOutcome::Failed
            }
        }
    }

    /// Local state is cleared by the identity transition that follows.
    pub async fn sign_out(&mut self) -> MutationOutcome {
        self.notice = None;
        match self.context.auth.end_session().await {
            Ok(()) => MutationOutcome::Applied,
            Err(error) => {
                tracing::error!("Failed to sign out: {}", error);
                self.notice = Some(ActionError::SignOut);
                MutationOutcome::Failed
            }
        }
    }

    pub async fn add_bookmark(&mut self, url: &str, title: &str) -> MutationOutcome {
        url.clone_into(&mut self.form.url);
        title.clone_into(&mut self.form.title);

        let Some(owner) = self.session.owner() else {
            return MutationOutcome::Skipped;
        };
        let Some(new_bookmark) = NewBookmark::from_input(url, title, owner) else {
            return MutationOutcome::Skipped;
        };

        self.notice = None;
        self.form.submitting = true;
        let result = self.context.store.insert_bookmark(&new_bookmark).await;
        self.form.submitting = false;

        match result {
            Ok(stored) => {
                tracing::info!(id = %stored.id, "Bookmark added");
                self.cache.insert_local(stored);
                self.form.clear();
                MutationOutcome::Applied
            }
            Err(error) => {
                tracing::error!("Failed to add bookmark: {}", error);
                self.notice = Some(ActionError::Create);
                MutationOutcome::Failed
            }
        }
    }

    pub async fn delete_bookmark(&mut self, id: &BookmarkId) -> MutationOutcome {
        let Some(owner) = self.session.owner() else {
            return MutationOutcome::Skipped;
        };

        self.notice = None;
        match self.context.store.delete_bookmark(id, owner).await {
            Ok(rows) => {
                tracing::info!(id = %id, rows, "Bookmark deleted");
                self.cache.remove_local(id);
                MutationOutcome::Applied
            }
            Err(error) => {
                tracing::error!(id = %id, "Failed to delete bookmark: {}", error);
                self.notice = Some(ActionError::Delete);
                MutationOutcome::Failed
            }
        }
    }

    async fn apply_identity(&mut self, next: Option<Identity>) {
        match self.session.apply(next) {
            IdentityTransition::SignedOut => {
                self.cache.clear();
                self.pending_loads = FuturesUnordered::new();
                self.listener.stop();
            }
            IdentityTransition::OwnerChanged(identity) => {
                self.cache.clear();
                self.pending_loads = FuturesUnordered::new();
                self.start_listener(&identity.id).await;
                self.schedule_reload(identity.id);
            }
            IdentityTransition::Refreshed(identity) => {
                self.start_listener(&identity.id).await;
                self.schedule_reload(identity.id);
            }
        }
    }

    async fn start_listener(&mut self, owner: &UserId) {
        if !self.live_updates {
            return;
        }
        let feed = Arc::clone(&self.context.feed);
        self.listener
            .start(feed.as_ref(), self.context.config.table(), owner)
            .await;
    }

    fn schedule_reload(&mut self, owner: UserId) {
        let store = Arc::clone(&self.context.store);
        self.pending_loads.push(
            async move {
                let result = store.list_bookmarks(&owner).await;
                LoadOutcome { owner, result }
            }
            .boxed(),
        );
    }

    fn finish_load(&mut self, outcome: LoadOutcome) -> MutationOutcome {
        if self.session.owner() != Some(&outcome.owner) {
            tracing::debug!(owner = %outcome.owner, "Discarding reload for a previous identity");
            return MutationOutcome::Skipped;
        }

        match outcome.result {
            Ok(bookmarks) => {
                tracing::debug!(count = bookmarks.len(), "Bookmarks loaded");
                self.cache.replace(bookmarks);
                MutationOutcome::Applied
            }
            Err(error) => {
                tracing::error!("Failed to load bookmarks: {}", error);
                self.notice = Some(ActionError::Load);
                MutationOutcome::Failed
            }
        }
    }
}

async fn recv_opt<T>(subscription: Option<&mut Subscription<T>>) -> Option<T> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}
