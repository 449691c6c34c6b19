//! Events module for the voice pipeline
//!
//! Structured events for session lifecycle, wake-word activity, recognized
//! commands and user-facing feedback.

use serde::{Deserialize, Serialize};

use crate::grammar::Command;

/// Why a command window closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowCloseReason {
    /// A command was consumed
    Command,
    Expired,
    LanguageChanged,
    Stopped,
}

/// Events emitted by the voice controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    /// Engine confirmed it is listening
    ListeningStarted,

    /// Session stopped (manually, by command or by a permission error)
    ListeningStopped,

    /// Live transcript for display; interim text included
    Transcript { text: String, is_final: bool },

    /// Wake phrase heard, command window open
    WakeWordDetected { phrase: String },

    /// Command window closed
    CommandWindowClosed { reason: WindowCloseReason },

    /// A command passed the gate and was dispatched
    CommandRecognized { command: Command, text: String },

    /// Transient feedback text for the UI
    Feedback { text: String },

    /// Feedback display time ran out
    FeedbackCleared,

    /// Microphone access denied; persistent until the next start
    PermissionDenied,

    /// Active language switched
    LanguageChanged { language: String },
}

impl std::fmt::Display for VoiceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceEvent::ListeningStarted => write!(f, "LISTENING_STARTED"),
            VoiceEvent::ListeningStopped => write!(f, "LISTENING_STOPPED"),
            VoiceEvent::Transcript { text, is_final } => {
                let kind = if *is_final { "FINAL" } else { "INTERIM" };
                write!(f, "TRANSCRIPT_{} ({})", kind, text)
            }
            VoiceEvent::WakeWordDetected { phrase } => write!(f, "WAKE_WORD_DETECTED ({})", phrase),
            VoiceEvent::CommandWindowClosed { reason } => {
                write!(f, "COMMAND_WINDOW_CLOSED ({:?})", reason)
            }
            VoiceEvent::CommandRecognized { command, .. } => {
                write!(f, "COMMAND_RECOGNIZED ({})", command)
            }
            VoiceEvent::Feedback { text } => write!(f, "FEEDBACK ({})", text),
            VoiceEvent::FeedbackCleared => write!(f, "FEEDBACK_CLEARED"),
            VoiceEvent::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            VoiceEvent::LanguageChanged { language } => {
                write!(f, "LANGUAGE_CHANGED ({})", language)
            }
        }
    }
}
