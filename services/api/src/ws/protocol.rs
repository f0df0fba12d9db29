//! Defines the WebSocket message protocol between the voice platform and the
//! interview server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Response identifier reserved for the opening greeting.
pub const GREETING_RESPONSE_ID: u64 = 0;

/// Speaker of a transcript entry as reported by the voice platform.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    User,
}

/// One entry of the running transcript the platform sends with turn events.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub role: Speaker,
    #[serde(default)]
    pub content: String,
}

/// Messages sent from the voice platform to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "interaction_type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Call setup carrying interview metadata. Older platforms send `call_started`.
    #[serde(alias = "call_started")]
    CallDetails {
        #[serde(default)]
        call: Option<serde_json::Value>,
    },
    /// The transcript changed but no reply is owed.
    UpdateOnly {
        #[serde(default)]
        transcript: Vec<Utterance>,
    },
    /// The user finished speaking and a reply is owed.
    ResponseRequired {
        #[serde(default)]
        response_id: Option<u64>,
        #[serde(default)]
        transcript: Vec<Utterance>,
    },
    /// The user has been silent for too long.
    ReminderRequired {
        #[serde(default)]
        response_id: Option<u64>,
        #[serde(default)]
        transcript: Vec<Utterance>,
    },
    /// Keep-alive that must be echoed straight back.
    PingPong {
        #[serde(default)]
        timestamp: Option<u64>,
    },
    #[serde(other)]
    Unknown,
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::CallDetails { .. } => "call_details",
            InboundEvent::UpdateOnly { .. } => "update_only",
            InboundEvent::ResponseRequired { .. } => "response_required",
            InboundEvent::ReminderRequired { .. } => "reminder_required",
            InboundEvent::PingPong { .. } => "ping_pong",
            InboundEvent::Unknown => "unknown",
        }
    }
}

/// The most recent thing the user said, if anything.
pub fn last_user_utterance(transcript: &[Utterance]) -> Option<&str> {
    transcript
        .iter()
        .rev()
        .find(|u| u.role == Speaker::User)
        .map(|u| u.content.trim())
        .filter(|c| !c.is_empty())
}

/// Machine-readable reason attached to an end-of-call frame.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    MaxDuration,
    Silence,
    Incompatibility,
    Mismatch,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            EndReason::MaxDuration => "max_duration",
            EndReason::Silence => "silence",
            EndReason::Incompatibility => "incompatibility",
            EndReason::Mismatch => "mismatch",
        };
        f.write_str(code)
    }
}

/// Directives that turn a response into the last one of the call.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCall {
    /// Hang up only once the message has been fully spoken.
    #[serde(rename = "end_call_after_spoken")]
    pub after_spoken: bool,
    pub no_interruption_allowed: bool,
    #[serde(rename = "end_call_reason")]
    pub reason: EndReason,
}

impl EndOfCall {
    /// Ends after the farewell is spoken, without letting the user talk over it.
    pub fn after_spoken(reason: EndReason) -> Self {
        Self {
            after_spoken: true,
            no_interruption_allowed: true,
            reason,
        }
    }

    /// Ends after the farewell is spoken, but the user may still interrupt it.
    pub fn interruptible(reason: EndReason) -> Self {
        Self {
            after_spoken: true,
            no_interruption_allowed: false,
            reason,
        }
    }
}

/// Handshake options declared on connect.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConfigPayload {
    pub auto_reconnect: bool,
    pub call_details: bool,
}

/// A spoken (or partially spoken) reply.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub response_id: u64,
    pub content: String,
    pub content_complete: bool,
    pub end_call: bool,
    #[serde(flatten)]
    pub end_of_call: Option<EndOfCall>,
}

/// Messages sent from the server to the voice platform.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum ServerFrame {
    Config { config: ConfigPayload },
    Response(ResponseFrame),
    PingPong { timestamp: Option<u64> },
}

impl ServerFrame {
    pub fn config() -> Self {
        ServerFrame::Config {
            config: ConfigPayload {
                auto_reconnect: true,
                call_details: true,
            },
        }
    }

    pub fn pong(timestamp: Option<u64>) -> Self {
        ServerFrame::PingPong { timestamp }
    }

    /// An incremental fragment of a streamed reply.
    pub fn chunk(response_id: u64, content: impl Into<String>) -> Self {
        ServerFrame::Response(ResponseFrame {
            response_id,
            content: content.into(),
            content_complete: false,
            end_call: false,
            end_of_call: None,
        })
    }

    /// A complete reply, optionally ending the call.
    pub fn complete(
        response_id: u64,
        content: impl Into<String>,
        end_of_call: Option<EndOfCall>,
    ) -> Self {
        ServerFrame::Response(ResponseFrame {
            response_id,
            content: content.into(),
            content_complete: true,
            end_call: end_of_call.is_some(),
            end_of_call,
        })
    }

    pub fn as_response(&self) -> Option<&ResponseFrame> {
        match self {
            ServerFrame::Response(r) => Some(r),
            _ => None,
        }
    }
}
