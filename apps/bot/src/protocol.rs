//! Room event vocabulary
//!
//! Typed views of the named events exchanged with the room server. The
//! transport decodes raw `(name, payload)` pairs into [`InboundEvent`] and
//! encodes [`OutboundEvent`] back into the same shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Numeric user rank as reported by the room
///
/// The room sends ranks as JSON numbers that are occasionally fractional.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub f64);

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginPayload {
    pub success: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserPayload {
    pub name: String,
    #[serde(default)]
    pub rank: Rank,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserLeavePayload {
    pub name: String,
}

/// A chat line; `time` is milliseconds since the Unix epoch
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatMsgPayload {
    pub username: String,
    pub msg: String,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueueWarnPayload {
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueueFailPayload {
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Events delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Socket-level connection established
    Connected,
    /// Socket closed by either side
    Disconnected { reason: String },
    /// Opening the socket failed
    ConnectError { message: String },
    /// Channel options received after joining
    ChannelOpts,
    Login(LoginPayload),
    UserList(Vec<UserPayload>),
    AddUser(UserPayload),
    SetUserRank(UserPayload),
    UserLeave(UserLeavePayload),
    ChatMsg(ChatMsgPayload),
    /// Playlist addition broadcast, used as the enqueue acknowledgment
    Queue,
    QueueWarn(QueueWarnPayload),
    QueueFail(QueueFailPayload),
}

impl InboundEvent {
    /// Decode a named event with its payload
    ///
    /// Returns `Ok(None)` for events the bot does not care about.
    pub fn decode(name: &str, payload: Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "connect" => Self::Connected,
            "disconnect" => Self::Disconnected {
                reason: payload.as_str().unwrap_or_default().to_string(),
            },
            "connect_error" => Self::ConnectError {
                message: payload
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| payload.to_string()),
            },
            "channelOpts" => Self::ChannelOpts,
            "login" => Self::Login(serde_json::from_value(payload)?),
            "userlist" => Self::UserList(serde_json::from_value(payload)?),
            "addUser" => Self::AddUser(serde_json::from_value(payload)?),
            "setUserRank" => Self::SetUserRank(serde_json::from_value(payload)?),
            "userLeave" => Self::UserLeave(serde_json::from_value(payload)?),
            "chatMsg" => Self::ChatMsg(serde_json::from_value(payload)?),
            "queue" => Self::Queue,
            "queueWarn" => Self::QueueWarn(serde_json::from_value(payload)?),
            "queueFail" => Self::QueueFail(serde_json::from_value(payload)?),
            other => {
                tracing::trace!(event = other, "Ignoring unhandled room event");
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}

/// Playlist insertion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub pos: String,
    pub temp: bool,
}

impl QueueRequest {
    /// Append a video to the end of the playlist as a temporary item
    pub fn video(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            media_type: "yt".to_string(),
            pos: "end".to_string(),
            temp: true,
        }
    }
}

/// Events the bot sends to the room
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    JoinChannel { name: String },
    Login { name: String, password: String },
    ChatMsg { msg: String },
    Queue(QueueRequest),
}

impl OutboundEvent {
    pub fn chat(msg: impl Into<String>) -> Self {
        Self::ChatMsg { msg: msg.into() }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinChannel { .. } => "joinChannel",
            Self::Login { .. } => "login",
            Self::ChatMsg { .. } => "chatMsg",
            Self::Queue(_) => "queue",
        }
    }

    /// Wire payload of the event
    pub fn payload(&self) -> Value {
        match self {
            Self::JoinChannel { name } => json!({ "name": name }),
            Self::Login { name, password } => json!({ "name": name, "pw": password }),
            Self::ChatMsg { msg } => json!({ "msg": msg }),
            Self::Queue(request) => json!(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_chat_message() {
        let event = InboundEvent::decode(
            "chatMsg",
            json!({ "username": "alice", "msg": "!content", "time": 1704067200000_i64, "meta": {} }),
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            event,
            InboundEvent::ChatMsg(ChatMsgPayload {
                username: "alice".to_string(),
                msg: "!content".to_string(),
                time: 1704067200000,
            })
        );
    }

    #[test]
    fn test_decode_userlist_with_fractional_rank() {
        let event = InboundEvent::decode(
            "userlist",
            json!([{ "name": "alice", "rank": 3 }, { "name": "bob", "rank": 1.5 }, { "name": "anon" }]),
        )
        .unwrap()
        .unwrap();

        let InboundEvent::UserList(users) = event else {
            panic!("expected a user list");
        };
        assert_eq!(users[0].rank, Rank(3.0));
        assert_eq!(users[1].rank, Rank(1.5));
        assert_eq!(users[2].rank, Rank(0.0));
    }

    #[test]
    fn test_decode_queue_fail_without_id() {
        let event = InboundEvent::decode("queueFail", json!({ "msg": "Video not found" }))
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            InboundEvent::QueueFail(QueueFailPayload {
                msg: "Video not found".to_string(),
                id: None,
            })
        );
    }

    #[test]
    fn test_decode_unknown_event_is_ignored() {
        assert_eq!(
            InboundEvent::decode("mediaUpdate", json!({ "currentTime": 3 })).unwrap(),
            None
        );
    }

    #[test]
    fn test_decode_malformed_payload_is_error() {
        assert!(InboundEvent::decode("chatMsg", json!({ "msg": 5 })).is_err());
    }

    #[test]
    fn test_queue_request_payload() {
        let event = OutboundEvent::Queue(QueueRequest::video("dQw4w9WgXcQ"));
        assert_eq!(event.name(), "queue");
        assert_eq!(
            event.payload(),
            json!({ "id": "dQw4w9WgXcQ", "type": "yt", "pos": "end", "temp": true })
        );
    }

    #[test]
    fn test_login_payload_uses_pw_key() {
        let event = OutboundEvent::Login {
            name: "tubebot".to_string(),
            password: "hunter2".to_string(),
        };
        assert_eq!(event.payload(), json!({ "name": "tubebot", "pw": "hunter2" }));
    }
}
