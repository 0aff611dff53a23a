use std::sync::Arc;

use crate::auth::{RedirectLauncher, SessionPersistence, SupabaseAuth};
use crate::backend::{AccessTokenSource, AuthService, ChangeFeed, RecordStore};
use crate::config::ClientConfig;
use crate::realtime::SupabaseChangeFeed;
use crate::store::SupabaseRecordStore;
use crate::Result;

/// Backend handles shared by every part of the client. Built once at startup.
#[derive(Clone)]
pub struct ClientContext {
    pub auth: Arc<dyn AuthService>,
    pub store: Arc<dyn RecordStore>,
    pub feed: Arc<dyn ChangeFeed>,
    pub config: ClientConfig,
}

impl ClientContext {
    pub fn new(
        config: ClientConfig,
        auth: Arc<dyn AuthService>,
        store: Arc<dyn RecordStore>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Self {
        Self {
            auth,
            store,
            feed,
            config,
        }
    }

    /// Wire the Supabase auth, PostgREST and Realtime clients together.
    ///
    /// The concrete auth service is returned too, for finishing the OAuth
    /// redirect once the callback delivers its code.
    pub fn supabase<S: SessionPersistence>(
        config: ClientConfig,
        sessions: S,
        launcher: Arc<dyn RedirectLauncher>,
    ) -> Result<(Self, Arc<SupabaseAuth<S>>)> {
        let auth = Arc::new(SupabaseAuth::new(&config, sessions, launcher)?);
        let tokens: Arc<dyn AccessTokenSource> = auth.clone();
        let store = Arc::new(SupabaseRecordStore::new(&config, Arc::clone(&tokens))?);
        let feed = Arc::new(SupabaseChangeFeed::new(&config, tokens)?);

        let context = Self::new(config, auth.clone(), store, feed);
        Ok((context, auth))
    }
}
