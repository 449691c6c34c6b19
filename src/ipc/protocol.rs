//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::controller::VoiceStatus;
use crate::dispatch::{MediaAction, PlaybackState};
use crate::events::VoiceEvent;

/// Requests from UI to daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to voice events and media actions
    Subscribe,

    /// Enable voice control
    StartListening,

    /// Disable voice control
    StopListening,

    /// Switch the recognition and command language
    SetLanguage { language: String },

    /// The client's player mounted or moved
    ReportPlayback { state: PlaybackState },

    /// The client's player unmounted
    DetachMedia,
}

/// Responses from daemon to UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current daemon status
    Status(DaemonStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Request accepted
    Ok,

    /// Pushed to subscribed clients
    Notification(Notification),

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "notification", content = "data", rename_all = "snake_case")]
pub enum Notification {
    /// Something happened in the voice pipeline
    VoiceEvent(VoiceEvent),
    /// The player should apply this action
    Media(MediaAction),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Whether a player has reported in
    pub media_attached: bool,

    pub voice: VoiceStatus,
}
