//! Loopback HTTP server that receives the OAuth redirect.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

use crate::error::CliError;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_PAGE: &str = "<!doctype html><html><body style=\"font-family: sans-serif\">\
<h1>Signed in</h1><p>You can close this tab and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<!doctype html><html><body style=\"font-family: sans-serif\">\
<h1>Sign-in failed</h1><p>Return to the terminal for details.</p></body></html>";

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>;

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Listener bound to the redirect URL's host and port.
pub struct CallbackServer {
    listener: TcpListener,
    path: String,
}

impl CallbackServer {
    pub async fn bind(redirect_url: &str) -> Result<Self, CliError> {
        let url = Url::parse(redirect_url)
            .map_err(|error| CliError::Config(format!("invalid redirect URL: {error}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| CliError::Config("redirect URL must include a host".to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the provider redirects back, then return the auth code.
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String, CliError> {
        let (code_sender, code_receiver) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(code_sender)));
        let router = Router::new()
            .route(&self.path, get(handle_callback))
            .with_state(slot);

        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(self.listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_receiver.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(timeout, code_receiver).await;

        let _ = shutdown_sender.send(());
        let abort = server.abort_handle();
        if tokio::time::timeout(SHUTDOWN_GRACE, server).await.is_err() {
            tracing::debug!("Callback server did not stop in time; aborting");
            abort.abort();
        }

        match outcome {
            Err(_) => Err(CliError::Callback(
                "timed out waiting for the browser".to_string(),
            )),
            Ok(Err(_)) => Err(CliError::Callback(
                "callback server stopped unexpectedly".to_string(),
            )),
            Ok(Ok(result)) => result.map_err(CliError::Callback),
        }
    }
}

async fn handle_callback(
    State(slot): State<CallbackSlot>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let result = callback_result(params);
    let page = if result.is_ok() {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };

    if let Some(sender) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
        let _ = sender.send(result);
    }
    Html(page)
}

pub fn callback_result(params: CallbackParams) -> Result<String, String> {
    if let Some(error) = params.error {
        return Err(params
            .error_description
            .map_or_else(|| error.clone(), |description| format!("{error}: {description}")));
    }

    params
        .code
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .ok_or_else(|| "redirect did not include an auth code".to_string())
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;

    #[test]
    fn callback_result_prefers_provider_error() {
        let params = CallbackParams {
            code: Some("abc".to_string()),
            error: Some("access_denied".to_string()),
            error_description: Some("User cancelled".to_string()),
        };
        assert_eq!(
            callback_result(params),
            Err("access_denied: User cancelled".to_string())
        );
    }

    #[test]
    fn callback_result_requires_code() {
        assert!(callback_result(CallbackParams::default()).is_err());
        let params = CallbackParams {
            code: Some(" abc ".to_string()),
            ..CallbackParams::default()
        };
        assert_eq!(callback_result(params), Ok("abc".to_string()));
    }

    #[tokio::test]
    async fn server_returns_code_from_redirect() {
        let server = CallbackServer::bind("http://127.0.0.1:0/callback")
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let waiting = tokio::spawn(server.wait_for_code(Duration::from_secs(5)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"GET /callback?code=auth-code-123 HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("Signed in"));
        assert_eq!(waiting.await.unwrap().unwrap(), "auth-code-123");
    }

    #[tokio::test]
    async fn server_times_out_without_redirect() {
        let server = CallbackServer::bind("http://127.0.0.1:0/callback")
            .await
            .unwrap();
        let error = server
            .wait_for_code(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(error, CliError::Callback(_)));
    }
}
