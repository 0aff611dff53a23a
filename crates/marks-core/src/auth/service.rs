//! Stateful Supabase auth service.
//!
//! Owns the live session, publishes identity transitions, and hands out
//! access tokens to the record store and change feed.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use url::Url;

use super::{
    AuthError, AuthResult, AuthSession, OAuthProvider, PkcePair, SessionPersistence,
    SupabaseAuthClient,
};
use crate::backend::{AccessTokenSource, AuthService, IdentitySubscription};
use crate::config::ClientConfig;
use crate::models::Identity;
use crate::subscription::Registry;

/// Sends the user to the provider's authorize page.
pub trait RedirectLauncher: Send + Sync {
    fn launch(&self, url: &Url) -> Result<(), String>;
}

pub struct SupabaseAuth<S: SessionPersistence> {
    client: SupabaseAuthClient<S>,
    session: tokio::sync::Mutex<Option<AuthSession>>,
    pending_pkce: Mutex<Option<PkcePair>>,
    changes: Registry<Option<Identity>>,
    launcher: Arc<dyn RedirectLauncher>,
}

impl<S: SessionPersistence> SupabaseAuth<S> {
    pub fn new(
        config: &ClientConfig,
        store: S,
        launcher: Arc<dyn RedirectLauncher>,
    ) -> AuthResult<Self> {
        Ok(Self {
            client: SupabaseAuthClient::new(config, store)?,
            session: tokio::sync::Mutex::new(None),
            pending_pkce: Mutex::new(None),
            changes: Registry::new(),
            launcher,
        })
    }

    pub const fn client(&self) -> &SupabaseAuthClient<S> {
        &self.client
    }

    /// Live identity-change subscriptions.
    pub fn listener_count(&self) -> usize {
        self.changes.subscriber_count()
    }

    /// Finish the redirect flow with the `code` delivered to the return URL.
    pub async fn complete_oauth_redirect(&self, auth_code: &str) -> AuthResult<Identity> {
        let pkce = self
            .pending_pkce
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(AuthError::NoPendingSignIn)?;

        let session = self.client.exchange_code(auth_code, &pkce).await?;
        let identity = session.user.clone();
        *self.session.lock().await = Some(session);

        tracing::info!(user_id = %identity.id, "Signed in");
        self.changes.publish(&Some(identity.clone()));
        Ok(identity)
    }

    /// Current session, refreshed when it is about to expire.
    ///
    /// A failed refresh ends the session and publishes the sign-out.
    async fn live_session(&self) -> Option<AuthSession> {
        let mut guard = self.session.lock().await;
        let current = guard.clone()?;
        if !current.is_expired() {
            return Some(current);
        }

        match self.client.refresh_session(&current.refresh_token).await {
            Ok(refreshed) => {
                let identity_changed = refreshed.user.id != current.user.id;
                *guard = Some(refreshed.clone());
                drop(guard);
                if identity_changed {
                    self.changes.publish(&Some(refreshed.user.clone()));
                }
                Some(refreshed)
            }
            Err(error) => {
                tracing::warn!("Failed to refresh session: {}", error);
                *guard = None;
                drop(guard);
                if let Err(error) = self.client.store().clear_session() {
                    tracing::warn!("Failed to clear persisted session: {}", error);
                }
                self.changes.publish(&None);
                None
            }
        }
    }
}

#[async_trait]
impl<S: SessionPersistence> AuthService for SupabaseAuth<S> {
    async fn current_identity(&self) -> AuthResult<Option<Identity>> {
        if let Some(session) = self.live_session().await {
            return Ok(Some(session.user));
        }

        let Some(restored) = self.client.restore_session().await? else {
            return Ok(None);
        };

        match self.client.get_user(&restored.access_token).await {
            Ok(identity) => {
                *self.session.lock().await = Some(AuthSession {
                    user: identity.clone(),
                    ..restored
                });
                Ok(Some(identity))
            }
            Err(AuthError::Unauthorized) => {
                tracing::info!("Persisted session was rejected; signing out locally");
                self.client.store().clear_session()?;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn on_identity_change(&self) -> IdentitySubscription {
        self.changes.subscribe()
    }

    async fn begin_oauth_redirect(
        &self,
        provider: OAuthProvider,
        return_url: &str,
    ) -> AuthResult<()> {
        let pkce = PkcePair::generate();
        let url = self.client.authorize_url(provider, return_url, &pkce)?;
        *self
            .pending_pkce
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(pkce);

        tracing::debug!(provider = %provider, "Opening OAuth authorize page");
        self.launcher.launch(&url).map_err(AuthError::Redirect)
    }

    async fn end_session(&self) -> AuthResult<()> {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            self.client.store().clear_session()?;
            return Ok(());
        };

        self.client.sign_out(&session.access_token).await?;
        *guard = None;
        drop(guard);

        tracing::info!("Signed out");
        self.changes.publish(&None);
        Ok(())
    }
}

#[async_trait]
impl<S: SessionPersistence> AccessTokenSource for SupabaseAuth<S> {
    async fn access_token(&self) -> Option<String> {
        self.live_session()
            .await
            .map(|session| session.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::util::unix_timestamp_now;

    struct RecordingLauncher(Mutex<Vec<String>>);

    impl RedirectLauncher for RecordingLauncher {
        fn launch(&self, url: &Url) -> Result<(), String> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_string());
            Ok(())
        }
    }

    struct FailingLauncher;

    impl RedirectLauncher for FailingLauncher {
        fn launch(&self, _url: &Url) -> Result<(), String> {
            Err("no browser available".to_string())
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("https://demo.supabase.co", "anon").unwrap()
    }

    #[tokio::test]
    async fn begin_redirect_launches_authorize_url() {
        let launcher = Arc::new(RecordingLauncher(Mutex::new(Vec::new())));
        let auth = SupabaseAuth::new(
            &config(),
            MemorySessionStore::default(),
            Arc::clone(&launcher) as Arc<dyn RedirectLauncher>,
        )
        .unwrap();

        auth.begin_oauth_redirect(OAuthProvider::Google, "http://127.0.0.1:8976/callback")
            .await
            .unwrap();

        let launched = launcher.0.lock().unwrap().clone();
        assert_eq!(launched.len(), 1);
        assert!(launched[0].starts_with("https://demo.supabase.co/auth/v1/authorize?provider=google"));
    }

    #[tokio::test]
    async fn begin_redirect_reports_launch_failure() {
        let auth = SupabaseAuth::new(
            &config(),
            MemorySessionStore::default(),
            Arc::new(FailingLauncher),
        )
        .unwrap();

        let error = auth
            .begin_oauth_redirect(OAuthProvider::Google, "http://127.0.0.1:8976/callback")
            .await
            .unwrap_err();
        assert!(matches!(error, AuthError::Redirect(_)));
    }

    #[tokio::test]
    async fn complete_without_pending_flow_is_rejected() {
        let auth = SupabaseAuth::new(
            &config(),
            MemorySessionStore::default(),
            Arc::new(FailingLauncher),
        )
        .unwrap();

        let error = auth.complete_oauth_redirect("code").await.unwrap_err();
        assert!(matches!(error, AuthError::NoPendingSignIn));
    }

    #[tokio::test]
    async fn signed_out_service_has_no_identity_or_token() {
        let auth = SupabaseAuth::new(
            &config(),
            MemorySessionStore::default(),
            Arc::new(FailingLauncher),
        )
        .unwrap();

        assert!(auth.current_identity().await.unwrap().is_none());
        assert!(auth.access_token().await.is_none());
    }

    #[tokio::test]
    async fn end_session_without_session_publishes_nothing() {
        let store = MemorySessionStore::with_session(AuthSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: unix_timestamp_now() + 3600,
            user: Identity::new("user-1", None),
        });
        let auth = SupabaseAuth::new(&config(), store.clone(), Arc::new(FailingLauncher)).unwrap();
        let mut changes = auth.on_identity_change();

        auth.end_session().await.unwrap();

        assert!(changes.try_recv().is_none());
        assert!(store.load_session().unwrap().is_none());
        drop(changes);
        assert_eq!(auth.listener_count(), 0);
    }
}
