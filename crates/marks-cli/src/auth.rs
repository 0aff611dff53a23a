//! Keychain session persistence and browser launching for the OAuth flow.

#[cfg(test)]
use std::collections::HashMap;
use std::process::{Command, Stdio};
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use url::Url;

use marks_core::auth::{AuthError, AuthResult, AuthSession, RedirectLauncher, SessionPersistence};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "marks-cli";

/// Session of one CLI profile, kept in the OS keychain.
#[derive(Clone)]
pub struct KeyringSessionStore {
    username: String,
}

impl KeyringSessionStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("supabase_session:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl SessionPersistence for KeyringSessionStore {
    #[cfg(not(test))]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        let session = match guard.get(&self.username) {
            Some(raw) => Some(serde_json::from_str(raw)?),
            None => None,
        };
        Ok(session)
    }

    #[cfg(not(test))]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let raw = serde_json::to_string(session)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_session(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

/// Opens the authorize page in the user's browser. `BROWSER` overrides the
/// platform opener.
pub struct BrowserLauncher;

impl RedirectLauncher for BrowserLauncher {
    fn launch(&self, url: &Url) -> Result<(), String> {
        println!("Opening your browser to sign in...");
        println!("If it does not open, visit:\n  {url}");

        let opener = preferred_opener();
        let mut parts = opener.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| "empty BROWSER command".to_string())?;
        Command::new(program)
            .args(parts)
            .arg(url.as_str())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
            .map_err(|error| format!("failed to launch `{opener}`: {error}"))
    }
}

fn preferred_opener() -> String {
    std::env::var("BROWSER")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_opener().to_string())
}

pub const fn default_opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    }
}

/// Prints the authorize page for copying into a browser elsewhere.
pub struct PrintLauncher;

impl RedirectLauncher for PrintLauncher {
    fn launch(&self, url: &Url) -> Result<(), String> {
        println!("Open this URL in a browser to sign in:\n  {url}");
        Ok(())
    }
}
