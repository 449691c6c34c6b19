//! Seam between the recognition session and a platform speech engine
//!
//! An engine instance is created per language by an `EngineFactory` and
//! reports back through an `EngineSink`. Every message is stamped with the
//! generation of the instance that produced it, so the session can drop
//! anything a torn-down instance delivers late.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// Configuration handed to the engine on construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub continuous: bool,
    pub interim_results: bool,
    pub language: String,
}

impl EngineConfig {
    /// The only configuration the session asks for
    pub fn continuous(language: &str) -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: language.to_string(),
        }
    }
}

/// One recognition hypothesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub transcript: String,
    pub is_final: bool,
}

/// Error codes reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorCode {
    /// Microphone access was refused
    PermissionDenied,
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    Other(String),
}

impl EngineErrorCode {
    /// Parse a platform error code string
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "not-allowed" | "service-not-allowed" | "permission-denied" => Self::PermissionDenied,
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the session can recover by restarting
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::PermissionDenied)
    }
}

impl std::fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "not-allowed"),
            Self::NoSpeech => write!(f, "no-speech"),
            Self::Aborted => write!(f, "aborted"),
            Self::AudioCapture => write!(f, "audio-capture"),
            Self::Network => write!(f, "network"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Events an engine instance reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started,
    Result { alternatives: Vec<Alternative> },
    Error(EngineErrorCode),
    Ended,
}

/// An engine event tagged with the generation of its instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineMessage {
    pub generation: u64,
    pub event: EngineEvent,
}

/// Errors from creating or starting an engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("speech recognition is not supported on this platform")]
    Unsupported,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("engine is already running")]
    AlreadyStarted,

    #[error("failed to start recognizer: {0}")]
    Spawn(String),
}

/// Where an engine instance sends its events
#[derive(Debug, Clone)]
pub struct EngineSink {
    generation: u64,
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl EngineSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<EngineMessage>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event; a closed receiver means the session is gone
    pub fn emit(&self, event: EngineEvent) {
        let message = EngineMessage {
            generation: self.generation,
            event,
        };
        if self.tx.send(message).is_err() {
            trace!(generation = self.generation, "engine event dropped, session gone");
        }
    }
}

/// A single platform recognition engine instance
pub trait RecognitionEngine: Send {
    /// Begin listening; completion is reported as `EngineEvent::Started`
    fn start(&mut self) -> Result<(), EngineError>;

    /// Stop listening; completion is reported as `EngineEvent::Ended`
    fn stop(&mut self);
}

/// Constructs engine instances
pub trait EngineFactory: Send {
    /// Whether the platform has an engine at all
    fn is_supported(&self) -> bool;

    /// Build an instance for `config` that reports into `sink`
    fn create(
        &self,
        config: EngineConfig,
        sink: EngineSink,
    ) -> Result<Box<dyn RecognitionEngine>, EngineError>;
}
