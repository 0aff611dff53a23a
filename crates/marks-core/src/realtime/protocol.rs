//! Phoenix channel frames spoken by Supabase Realtime (protocol `vsn=1.0.0`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{RealtimeError, RealtimeResult};
use crate::models::{Bookmark, BookmarkId, ChangeEvent, ChangeKind, UserId};

const PHOENIX_TOPIC: &str = "phoenix";

/// A `postgres_changes` channel for one table filtered to one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    topic: String,
    table: String,
    filter: String,
}

impl ChannelSpec {
    pub fn new(table: &str, owner: &UserId) -> Self {
        Self {
            topic: format!("realtime:{table}-realtime"),
            table: table.to_string(),
            filter: format!("user_id=eq.{owner}"),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn join_frame(&self, join_ref: &str, access_token: Option<&str>) -> String {
        let mut payload = json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": self.table,
                    "filter": self.filter,
                }],
                "private": false,
            },
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }

        encode(&OutgoingFrame {
            topic: &self.topic,
            event: "phx_join",
            payload,
            reference: join_ref,
            join_ref: Some(join_ref),
        })
    }

    pub fn leave_frame(&self, reference: &str, join_ref: &str) -> String {
        encode(&OutgoingFrame {
            topic: &self.topic,
            event: "phx_leave",
            payload: json!({}),
            reference,
            join_ref: Some(join_ref),
        })
    }
}

pub fn heartbeat_frame(reference: &str) -> String {
    encode(&OutgoingFrame {
        topic: PHOENIX_TOPIC,
        event: "heartbeat",
        payload: json!({}),
        reference,
        join_ref: None,
    })
}

/// Monotonic Phoenix message references.
#[derive(Debug, Default)]
pub struct RefCounter(u64);

impl RefCounter {
    pub fn next_ref(&mut self) -> String {
        self.0 += 1;
        self.0.to_string()
    }
}

#[derive(Serialize)]
struct OutgoingFrame<'a> {
    topic: &'a str,
    event: &'a str,
    payload: Value,
    #[serde(rename = "ref")]
    reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    join_ref: Option<&'a str>,
}

fn encode(frame: &OutgoingFrame<'_>) -> String {
    // A frame of strings and JSON values always serializes.
    serde_json::to_string(frame).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct IncomingFrame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OldRecordKey {
    id: BookmarkId,
}

/// Server frames the channel driver cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Change(ChangeEvent),
    JoinReply {
        reference: Option<String>,
        ok: bool,
        detail: String,
    },
    ChannelClosed {
        reason: String,
    },
    SystemError {
        message: String,
    },
    Ignored,
}

/// Decode one text frame received on the socket for `channel`.
pub fn parse_frame(text: &str, channel: &ChannelSpec) -> RealtimeResult<Inbound> {
    let frame: IncomingFrame = serde_json::from_str(text)?;
    if frame.topic != channel.topic {
        return Ok(Inbound::Ignored);
    }

    match frame.event.as_str() {
        "postgres_changes" => {
            let payload: ChangePayload = serde_json::from_value(frame.payload)?;
            Ok(Inbound::Change(change_event(payload.data)?))
        }
        "phx_reply" => {
            let status = frame.payload["status"].as_str().unwrap_or_default();
            Ok(Inbound::JoinReply {
                reference: frame.reference,
                ok: status == "ok",
                detail: frame.payload["response"].to_string(),
            })
        }
        "phx_error" | "phx_close" => Ok(Inbound::ChannelClosed {
            reason: frame.event,
        }),
        "system" if frame.payload["status"].as_str() == Some("error") => {
            Ok(Inbound::SystemError {
                message: frame.payload["message"]
                    .as_str()
                    .unwrap_or("unknown realtime error")
                    .to_string(),
            })
        }
        _ => Ok(Inbound::Ignored),
    }
}

fn change_event(data: ChangeData) -> RealtimeResult<ChangeEvent> {
    match data.kind {
        ChangeKind::Insert => Ok(ChangeEvent::Insert(record(data.record)?)),
        ChangeKind::Update => Ok(ChangeEvent::Update(record(data.record)?)),
        ChangeKind::Delete => {
            let old = data.old_record.ok_or_else(|| {
                RealtimeError::Protocol("delete event without old_record".to_string())
            })?;
            let key: OldRecordKey = serde_json::from_value(old)?;
            Ok(ChangeEvent::Delete { id: key.id })
        }
    }
}

fn record(value: Option<Value>) -> RealtimeResult<Bookmark> {
    let value =
        value.ok_or_else(|| RealtimeError::Protocol("change event without record".to_string()))?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn channel() -> ChannelSpec {
        ChannelSpec::new("bookmarks", &UserId::new("user-1"))
    }

    #[test]
    fn join_frame_scopes_changes_to_owner() {
        let frame: Value =
            serde_json::from_str(&channel().join_frame("1", Some("jwt-token"))).unwrap();

        assert_eq!(frame["topic"], "realtime:bookmarks-realtime");
        assert_eq!(frame["event"], "phx_join");
        assert_eq!(frame["ref"], "1");
        assert_eq!(frame["join_ref"], "1");
        assert_eq!(frame["payload"]["access_token"], "jwt-token");
        let changes = &frame["payload"]["config"]["postgres_changes"][0];
        assert_eq!(changes["event"], "*");
        assert_eq!(changes["schema"], "public");
        assert_eq!(changes["table"], "bookmarks");
        assert_eq!(changes["filter"], "user_id=eq.user-1");
    }

    #[test]
    fn heartbeat_uses_phoenix_topic() {
        let frame: Value = serde_json::from_str(&heartbeat_frame("7")).unwrap();
        assert_eq!(frame["topic"], "phoenix");
        assert_eq!(frame["event"], "heartbeat");
        assert_eq!(frame["ref"], "7");
        assert!(frame.get("join_ref").is_none());
    }

    #[test]
    fn parses_insert_event() {
        let text = r#"{
            "topic": "realtime:bookmarks-realtime",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "schema": "public",
                    "table": "bookmarks",
                    "commit_timestamp": "2025-02-01T10:15:30Z",
                    "type": "INSERT",
                    "errors": null,
                    "record": {
                        "id": "b-2",
                        "url": "https://example.com",
                        "title": "Example",
                        "created_at": "2025-02-01T10:15:30.5+00:00",
                        "user_id": "user-1"
                    },
                    "old_record": null
                }
            }
        }"#;

        let Inbound::Change(ChangeEvent::Insert(bookmark)) = parse_frame(text, &channel()).unwrap()
        else {
            panic!("expected insert event");
        };
        assert_eq!(bookmark.id.as_str(), "b-2");
        assert_eq!(bookmark.title, "Example");
    }

    #[test]
    fn parses_delete_event_from_old_record_key() {
        let text = r#"{
            "topic": "realtime:bookmarks-realtime",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "type": "DELETE",
                    "record": null,
                    "old_record": { "id": "b-1" }
                }
            }
        }"#;

        assert_eq!(
            parse_frame(text, &channel()).unwrap(),
            Inbound::Change(ChangeEvent::Delete {
                id: BookmarkId::new("b-1")
            })
        );
    }

    #[test]
    fn parses_join_reply_status() {
        let text = r#"{
            "topic": "realtime:bookmarks-realtime",
            "event": "phx_reply",
            "ref": "1",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        }"#;

        let Inbound::JoinReply {
            reference,
            ok,
            detail,
        } = parse_frame(text, &channel()).unwrap()
        else {
            panic!("expected join reply");
        };
        assert_eq!(reference.as_deref(), Some("1"));
        assert!(!ok);
        assert!(detail.contains("unauthorized"));
    }

    #[test]
    fn ignores_frames_for_other_topics() {
        let text = r#"{"topic":"phoenix","event":"phx_reply","ref":"2","payload":{"status":"ok","response":{}}}"#;
        assert_eq!(parse_frame(text, &channel()).unwrap(), Inbound::Ignored);
    }

    #[test]
    fn update_without_record_is_a_protocol_error() {
        let text = r#"{
            "topic": "realtime:bookmarks-realtime",
            "event": "postgres_changes",
            "payload": { "data": { "type": "UPDATE" } }
        }"#;
        assert!(parse_frame(text, &channel()).is_err());
    }
}
