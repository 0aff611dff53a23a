//! Supabase Realtime change feed over a Phoenix websocket.
//!
//! Each subscription owns one socket and a background task that joins the
//! `postgres_changes` channel, keeps the connection alive with heartbeats,
//! and reconnects with backoff. Dropping the subscription leaves the channel
//! and closes the socket.

mod protocol;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

pub use protocol::{heartbeat_frame, parse_frame, ChannelSpec, Inbound, RefCounter};

use crate::backend::{AccessTokenSource, ChangeFeed, ChangeSubscription};
use crate::config::ClientConfig;
use crate::models::{ChangeEvent, UserId};
use crate::subscription::Subscription;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const RECONNECT_DELAYS: [Duration; 4] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Invalid realtime configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Realtime connection failed: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Realtime JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Realtime protocol error: {0}")]
    Protocol(String),
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Clone)]
pub struct SupabaseChangeFeed {
    endpoint: Url,
    tokens: Arc<dyn AccessTokenSource>,
}

impl SupabaseChangeFeed {
    pub fn new(config: &ClientConfig, tokens: Arc<dyn AccessTokenSource>) -> RealtimeResult<Self> {
        let endpoint = config
            .realtime_url()
            .map_err(|error| RealtimeError::InvalidConfiguration(error.to_string()))?;
        Ok(Self { endpoint, tokens })
    }

    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChangeFeed for SupabaseChangeFeed {
    async fn subscribe(&self, table: &str, owner: &UserId) -> RealtimeResult<ChangeSubscription> {
        let channel = ChannelSpec::new(table, owner);
        let socket = connect(&self.endpoint).await?;
        tracing::debug!(topic = channel.topic(), filter = channel.filter(), "Realtime connected");

        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_channel(
            socket,
            self.endpoint.clone(),
            Arc::clone(&self.tokens),
            channel,
            sender,
        ));
        Ok(Subscription::from_receiver(receiver))
    }
}

async fn connect(endpoint: &Url) -> RealtimeResult<Socket> {
    let (socket, _response) = connect_async(endpoint.as_str()).await?;
    Ok(socket)
}

enum SocketOutcome {
    Unsubscribed,
    Disconnected(String),
    /// The server refused `phx_join`. Retrying would be refused again.
    Rejected(String),
}

async fn run_channel(
    mut socket: Socket,
    endpoint: Url,
    tokens: Arc<dyn AccessTokenSource>,
    channel: ChannelSpec,
    events: mpsc::UnboundedSender<ChangeEvent>,
) {
    loop {
        match drive_socket(&mut socket, tokens.as_ref(), &channel, &events).await {
            SocketOutcome::Unsubscribed => {
                tracing::debug!(topic = channel.topic(), "Realtime channel left");
                return;
            }
            SocketOutcome::Rejected(detail) => {
                tracing::error!(topic = channel.topic(), "Realtime join rejected: {}", detail);
                if let Err(error) = socket.close(None).await {
                    tracing::debug!("Failed to close realtime socket: {}", error);
                }
                return;
            }
            SocketOutcome::Disconnected(reason) => {
                tracing::warn!(topic = channel.topic(), "Realtime disconnected: {}", reason);
            }
        }

        let Some(reconnected) = reconnect(&endpoint, &events).await else {
            return;
        };
        socket = reconnected;
    }
}

/// Retry with growing delays until connected or the subscriber goes away.
async fn reconnect(endpoint: &Url, events: &mpsc::UnboundedSender<ChangeEvent>) -> Option<Socket> {
    let mut attempt = 0usize;
    loop {
        let delay = RECONNECT_DELAYS[attempt.min(RECONNECT_DELAYS.len() - 1)];
        attempt += 1;
        tokio::select! {
            () = events.closed() => return None,
            () = tokio::time::sleep(delay) => {}
        }

        match connect(endpoint).await {
            Ok(socket) => {
                tracing::info!(attempt, "Realtime reconnected");
                return Some(socket);
            }
            Err(error) => tracing::warn!(attempt, "Realtime reconnect failed: {}", error),
        }
    }
}

async fn drive_socket(
    socket: &mut Socket,
    tokens: &dyn AccessTokenSource,
    channel: &ChannelSpec,
    events: &mpsc::UnboundedSender<ChangeEvent>,
) -> SocketOutcome {
    let mut refs = RefCounter::default();
    let join_ref = refs.next_ref();
    let access_token = tokens.access_token().await;
    let join = channel.join_frame(&join_ref, access_token.as_deref());
    if let Err(error) = socket.send(Message::text(join)).await {
        return SocketOutcome::Disconnected(error.to_string());
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            () = events.closed() => {
                let leave = channel.leave_frame(&refs.next_ref(), &join_ref);
                if let Err(error) = socket.send(Message::text(leave)).await {
                    tracing::debug!("Failed to send phx_leave: {}", error);
                }
                if let Err(error) = socket.close(None).await {
                    tracing::debug!("Failed to close realtime socket: {}", error);
                }
                return SocketOutcome::Unsubscribed;
            }
            _ = heartbeat.tick() => {
                if let Err(error) = socket.send(Message::text(heartbeat_frame(&refs.next_ref()))).await {
                    return SocketOutcome::Disconnected(error.to_string());
                }
            }
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(outcome) = handle_text(text.as_str(), channel, &join_ref, events) {
                        return outcome;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return SocketOutcome::Disconnected(format!("closed by server: {frame:?}"));
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => return SocketOutcome::Disconnected(error.to_string()),
                None => return SocketOutcome::Disconnected("stream ended".to_string()),
            },
        }
    }
}

fn handle_text(
    text: &str,
    channel: &ChannelSpec,
    join_ref: &str,
    events: &mpsc::UnboundedSender<ChangeEvent>,
) -> Option<SocketOutcome> {
    match parse_frame(text, channel) {
        Ok(Inbound::Change(event)) => {
            tracing::trace!(kind = ?event.kind(), id = %event.id(), "Realtime change");
            // A closed receiver is picked up by the select loop.
            let _ = events.send(event);
            None
        }
        Ok(Inbound::JoinReply { reference, ok, detail }) => {
            if reference.as_deref() != Some(join_ref) {
                return None;
            }
            if ok {
                tracing::info!(topic = channel.topic(), "Realtime channel joined");
                None
            } else {
                Some(SocketOutcome::Rejected(detail))
            }
        }
        Ok(Inbound::ChannelClosed { reason }) => Some(SocketOutcome::Disconnected(reason)),
        Ok(Inbound::SystemError { message }) => {
            tracing::warn!(topic = channel.topic(), "Realtime system error: {}", message);
            None
        }
        Ok(Inbound::Ignored) => None,
        Err(error) => {
            tracing::warn!("Skipping malformed realtime frame: {}", error);
            None
        }
    }
}
