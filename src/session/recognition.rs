//! Continuous recognition session
//!
//! Keeps exactly one engine instance alive while listening and restarts it
//! after a short debounce whenever the engine ends on its own. A manual stop,
//! a permission error or teardown cancels any pending restart and bumps the
//! generation so late events from the old instance are dropped.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::engine::{
    EngineConfig, EngineError, EngineErrorCode, EngineEvent, EngineFactory, EngineMessage,
    EngineSink, RecognitionEngine,
};

/// Lifecycle of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Stopped,
    Starting,
    Listening,
    Restarting,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Stopped => write!(f, "Stopped"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Restarting => write!(f, "Restarting"),
        }
    }
}

/// A normalized transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionEvent {
    /// Lower-cased and trimmed
    pub text: String,
    pub is_final: bool,
    pub timestamp: Instant,
}

impl RecognitionEvent {
    pub fn new(raw: &str, is_final: bool, timestamp: Instant) -> Self {
        Self {
            text: raw.trim().to_lowercase(),
            is_final,
            timestamp,
        }
    }
}

/// Callback receiving every delivered transcript
pub type TextSubscriber = Box<dyn FnMut(&RecognitionEvent) + Send>;

/// Things the owner of the session needs to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    /// Engine confirmed it is listening
    Listening,
    Text(RecognitionEvent),
    /// Terminal; the session is stopped
    PermissionDenied,
    /// The platform has no engine; the session is stopped
    Unsupported,
    /// Engine ended on its own, restart is scheduled
    Restarting,
}

pub struct RecognitionSession {
    factory: Box<dyn EngineFactory>,
    engine_tx: mpsc::UnboundedSender<EngineMessage>,
    engine: Option<Box<dyn RecognitionEngine>>,
    state: SessionState,
    language: String,
    /// Incremented for every engine instance and on every stop
    generation: u64,
    manual_stop: bool,
    restart_at: Option<Instant>,
    restart_delay: Duration,
    supported: bool,
    permission_denied: bool,
    subscribers: Vec<TextSubscriber>,
}

impl RecognitionSession {
    /// Create a stopped session; support is probed once here
    pub fn new(
        factory: Box<dyn EngineFactory>,
        engine_tx: mpsc::UnboundedSender<EngineMessage>,
        language: &str,
        restart_delay: Duration,
    ) -> Self {
        let supported = factory.is_supported();
        if !supported {
            warn!("speech recognition not supported, voice control disabled");
        }

        Self {
            factory,
            engine_tx,
            engine: None,
            state: SessionState::Stopped,
            language: language.to_string(),
            generation: 0,
            manual_stop: false,
            restart_at: None,
            restart_delay,
            supported,
            permission_denied: false,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn permission_denied(&self) -> bool {
        self.permission_denied
    }

    /// Pending restart deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.restart_at
    }

    /// Register a transcript subscriber; delivery follows registration order
    pub fn on_text(&mut self, subscriber: TextSubscriber) {
        self.subscribers.push(subscriber);
    }

    /// Start listening; a no-op unless stopped
    pub fn start(&mut self, now: Instant) -> Option<SessionOutput> {
        if !self.supported {
            debug!("start ignored, recognition unsupported");
            return Some(SessionOutput::Unsupported);
        }
        if self.state != SessionState::Stopped {
            debug!(state = %self.state, "start ignored, session already active");
            return None;
        }

        self.manual_stop = false;
        self.permission_denied = false;
        self.transition_to(SessionState::Starting);
        self.launch(now)
    }

    /// Stop listening and cancel any pending restart; idempotent
    pub fn stop(&mut self) -> bool {
        self.manual_stop = true;
        self.restart_at = None;
        if let Some(mut engine) = self.engine.take() {
            engine.stop();
        }

        if self.state == SessionState::Stopped {
            return false;
        }

        self.generation += 1;
        self.transition_to(SessionState::Stopped);
        true
    }

    /// Switch language; an active session swaps its engine instance
    pub fn set_language(&mut self, language: &str, now: Instant) -> Option<SessionOutput> {
        if self.language == language {
            return None;
        }
        self.language = language.to_string();

        if self.state == SessionState::Stopped {
            return None;
        }

        info!(language, "restarting engine for new language");
        self.restart_at = None;
        if let Some(mut engine) = self.engine.take() {
            engine.stop();
        }
        self.transition_to(SessionState::Starting);
        self.launch(now)
    }

    /// Apply one engine message
    pub fn handle_message(&mut self, message: EngineMessage, now: Instant) -> Vec<SessionOutput> {
        if message.generation != self.generation || self.state == SessionState::Stopped {
            trace!(
                generation = message.generation,
                current = self.generation,
                "dropping stale engine event"
            );
            return Vec::new();
        }

        match message.event {
            EngineEvent::Started => {
                if matches!(self.state, SessionState::Starting | SessionState::Restarting) {
                    self.transition_to(SessionState::Listening);
                    return vec![SessionOutput::Listening];
                }
                Vec::new()
            }
            EngineEvent::Result { alternatives } => alternatives
                .iter()
                .map(|alt| RecognitionEvent::new(&alt.transcript, alt.is_final, now))
                .filter(|event| !event.text.is_empty())
                .map(|event| {
                    for subscriber in self.subscribers.iter_mut() {
                        subscriber(&event);
                    }
                    SessionOutput::Text(event)
                })
                .collect(),
            EngineEvent::Error(code) => {
                if code.is_transient() {
                    debug!(%code, "transient recognition error");
                    Vec::new()
                } else {
                    self.deny_permission();
                    vec![SessionOutput::PermissionDenied]
                }
            }
            EngineEvent::Ended => {
                if self.manual_stop {
                    return Vec::new();
                }
                self.engine = None;
                self.schedule_restart(now);
                vec![SessionOutput::Restarting]
            }
        }
    }

    /// Fire the restart debounce if it is due
    pub fn poll(&mut self, now: Instant) -> Option<SessionOutput> {
        match self.restart_at {
            Some(at) if at <= now => {
                self.restart_at = None;
                if self.state == SessionState::Restarting {
                    debug!(generation = self.generation + 1, "restarting recognition engine");
                    self.launch(now)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Create and start a fresh engine instance
    fn launch(&mut self, now: Instant) -> Option<SessionOutput> {
        self.generation += 1;
        let sink = EngineSink::new(self.generation, self.engine_tx.clone());
        let config = EngineConfig::continuous(&self.language);

        let mut engine = match self.factory.create(config, sink) {
            Ok(engine) => engine,
            Err(e) => return self.launch_failed(e, now),
        };

        match engine.start() {
            Ok(()) | Err(EngineError::AlreadyStarted) => {
                self.engine = Some(engine);
                None
            }
            Err(e) => self.launch_failed(e, now),
        }
    }

    fn launch_failed(&mut self, error: EngineError, now: Instant) -> Option<SessionOutput> {
        match error {
            EngineError::PermissionDenied => {
                self.deny_permission();
                Some(SessionOutput::PermissionDenied)
            }
            EngineError::Unsupported => {
                self.supported = false;
                self.stop();
                Some(SessionOutput::Unsupported)
            }
            e => {
                warn!(?e, "failed to start recognition engine");
                self.schedule_restart(now);
                Some(SessionOutput::Restarting)
            }
        }
    }

    fn schedule_restart(&mut self, now: Instant) {
        self.transition_to(SessionState::Restarting);
        self.restart_at = Some(now + self.restart_delay);
    }

    fn deny_permission(&mut self) {
        warn!(code = %EngineErrorCode::PermissionDenied, "microphone permission denied");
        self.permission_denied = true;
        self.stop();
    }

    fn transition_to(&mut self, new_state: SessionState) {
        if self.state != new_state {
            info!(
                from = %self.state,
                to = %new_state,
                generation = self.generation,
                "session transition"
            );
            self.state = new_state;
        }
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.stop();
    }
}
