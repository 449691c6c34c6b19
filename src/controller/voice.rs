//! Voice controller: the single owner of the pipeline
//!
//! Recognition session → wake-word gate → command grammar → dispatcher.
//! Every transition runs on the controller's task; the async driver only
//! decides when to call `handle_*` and `poll`.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::Config;
use crate::dispatch::{CommandDispatcher, MediaSurface};
use crate::events::{VoiceEvent, WindowCloseReason};
use crate::gate::{GateState, WakeWordGate};
use crate::locale::{LocaleEntry, LocaleTable};
use crate::session::{
    EngineFactory, EngineMessage, RecognitionSession, SessionOutput, SessionState,
};

/// Requests from the outside world
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlInput {
    Start,
    Stop,
    SetLanguage(String),
}

/// Snapshot of the pipeline for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStatus {
    /// Capability flag: the platform has a recognition engine
    pub supported: bool,
    pub session: SessionState,
    pub gate: GateState,
    pub language: String,
    pub permission_denied: bool,
    /// Feedback currently on screen
    pub feedback: Option<String>,
    /// Transcript of the last command that was consumed
    pub last_command: Option<String>,
}

pub struct VoiceController {
    session: RecognitionSession,
    gate: WakeWordGate,
    dispatcher: CommandDispatcher,
    media: Box<dyn MediaSurface>,
    table: &'static LocaleTable,
    locale: &'static LocaleEntry,
    clock: Arc<dyn Clock>,
    event_tx: broadcast::Sender<VoiceEvent>,
    status_tx: watch::Sender<VoiceStatus>,
    last_command: Option<String>,
}

impl VoiceController {
    /// Build the pipeline; engines report into `engine_tx`
    pub fn new(
        config: &Config,
        factory: Box<dyn EngineFactory>,
        engine_tx: mpsc::UnboundedSender<EngineMessage>,
        media: Box<dyn MediaSurface>,
        event_tx: broadcast::Sender<VoiceEvent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let table = LocaleTable::builtin();
        let locale = table.resolve(&config.language);

        let mut session = RecognitionSession::new(
            factory,
            engine_tx,
            &config.language,
            config.timing.restart_delay,
        );

        let transcript_tx = event_tx.clone();
        session.on_text(Box::new(move |event| {
            let _ = transcript_tx.send(VoiceEvent::Transcript {
                text: event.text.clone(),
                is_final: event.is_final,
            });
        }));

        let (status_tx, _) = watch::channel(VoiceStatus {
            supported: session.is_supported(),
            session: session.state(),
            gate: GateState::Idle,
            language: config.language.clone(),
            permission_denied: false,
            feedback: None,
            last_command: None,
        });

        info!(
            language = %config.language,
            locale = locale.language_tag,
            supported = session.is_supported(),
            "voice controller created"
        );

        Self {
            session,
            gate: WakeWordGate::new(config.timing.wake_window),
            dispatcher: CommandDispatcher::new(
                config.timing.feedback_duration,
                config.timing.seek_step_secs,
            ),
            media,
            table,
            locale,
            clock,
            event_tx,
            status_tx,
            last_command: None,
        }
    }

    /// Watch the status snapshot; updated after every step
    pub fn subscribe_status(&self) -> watch::Receiver<VoiceStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> VoiceStatus {
        let now = self.clock.now();
        VoiceStatus {
            supported: self.session.is_supported(),
            session: self.session.state(),
            gate: self.gate.state(),
            language: self.session.language().to_string(),
            permission_denied: self.session.permission_denied(),
            feedback: self
                .dispatcher
                .current_feedback(now)
                .map(|message| message.text.clone()),
            last_command: self.last_command.clone(),
        }
    }

    /// Apply one external request
    pub fn handle_input(&mut self, input: ControlInput) {
        let now = self.clock.now();
        debug!(?input, "control input");

        match input {
            ControlInput::Start => {
                if let Some(output) = self.session.start(now) {
                    self.on_session_output(output, now);
                }
            }
            ControlInput::Stop => self.stop_session(),
            ControlInput::SetLanguage(language) => self.set_language(&language, now),
        }
        self.publish_status();
    }

    /// Apply one engine message
    pub fn handle_engine(&mut self, message: EngineMessage) {
        let now = self.clock.now();
        for output in self.session.handle_message(message, now) {
            self.on_session_output(output, now);
        }
        self.publish_status();
    }

    /// Fire due deadlines: restart debounce, window expiry, feedback expiry
    pub fn poll(&mut self) {
        let now = self.clock.now();

        if let Some(output) = self.session.poll(now) {
            self.on_session_output(output, now);
        }
        if self.gate.poll(now) {
            self.emit(VoiceEvent::CommandWindowClosed {
                reason: WindowCloseReason::Expired,
            });
        }
        if self.dispatcher.poll(now) {
            self.emit(VoiceEvent::FeedbackCleared);
        }
        self.publish_status();
    }

    /// Earliest outstanding deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.session.next_deadline(),
            self.gate.next_deadline(),
            self.dispatcher.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Run the controller until the input channel closes
    pub async fn run(
        &mut self,
        mut input_rx: mpsc::UnboundedReceiver<ControlInput>,
        mut engine_rx: mpsc::UnboundedReceiver<EngineMessage>,
    ) {
        info!("voice controller started");

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                // Deadlines first, so an expired window closes before late text
                biased;
                _ = sleep_until(deadline) => self.poll(),
                input = input_rx.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
                Some(message) = engine_rx.recv() => self.handle_engine(message),
            }
        }

        self.stop_session();
        self.publish_status();
        info!("voice controller stopped");
    }

    fn on_session_output(&mut self, output: SessionOutput, now: Instant) {
        match output {
            SessionOutput::Listening => {
                self.gate.on_session_listening();
                self.emit(VoiceEvent::ListeningStarted);
            }
            SessionOutput::Text(event) => {
                let outcome = self.gate.on_event(&event, self.locale, now);
                if outcome.expired {
                    self.emit(VoiceEvent::CommandWindowClosed {
                        reason: WindowCloseReason::Expired,
                    });
                }
                if let Some(phrase) = outcome.wake_phrase {
                    self.emit(VoiceEvent::WakeWordDetected {
                        phrase: phrase.to_string(),
                    });
                }
                let Some(gated) = outcome.command else {
                    return;
                };

                self.last_command = Some(gated.text.clone());
                self.emit(VoiceEvent::CommandRecognized {
                    command: gated.command,
                    text: gated.text,
                });
                self.emit(VoiceEvent::CommandWindowClosed {
                    reason: WindowCloseReason::Command,
                });

                let dispatched =
                    self.dispatcher
                        .dispatch(gated.command, self.media.as_mut(), self.locale, now);
                if let Some(text) = dispatched.feedback {
                    self.emit(VoiceEvent::Feedback { text });
                }
                if dispatched.stop_listening {
                    self.stop_session();
                }
            }
            SessionOutput::PermissionDenied => {
                self.close_gate();
                self.emit(VoiceEvent::PermissionDenied);
                self.emit(VoiceEvent::ListeningStopped);
            }
            SessionOutput::Unsupported => self.close_gate(),
            SessionOutput::Restarting => debug!("engine ended, restart scheduled"),
        }
    }

    fn stop_session(&mut self) {
        let stopped = self.session.stop();
        self.close_gate();
        if stopped {
            self.emit(VoiceEvent::ListeningStopped);
        }
    }

    fn close_gate(&mut self) {
        if self.gate.on_session_stopped() {
            self.emit(VoiceEvent::CommandWindowClosed {
                reason: WindowCloseReason::Stopped,
            });
        }
    }

    fn set_language(&mut self, language: &str, now: Instant) {
        let language = language.trim();
        if language.is_empty() || language == self.session.language() {
            return;
        }

        if self.gate.on_locale_changed() {
            self.emit(VoiceEvent::CommandWindowClosed {
                reason: WindowCloseReason::LanguageChanged,
            });
        }
        self.locale = self.table.resolve(language);
        info!(language, locale = self.locale.language_tag, "language changed");

        if let Some(output) = self.session.set_language(language, now) {
            self.on_session_output(output, now);
        }
        self.emit(VoiceEvent::LanguageChanged {
            language: language.to_string(),
        });
    }

    fn emit(&self, event: VoiceEvent) {
        debug!(%event, "emitting voice event");
        let _ = self.event_tx.send(event);
    }

    fn publish_status(&self) {
        let status = self.status();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

impl Drop for VoiceController {
    fn drop(&mut self) {
        self.session.stop();
        self.gate.on_session_stopped();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::dispatch::RecordingMedia;
    use crate::grammar::Command;
    use crate::session::fake::{FakeFactory, FakeLog};
    use crate::session::{Alternative, EngineEvent};
    use std::sync::Mutex;
    use std::time::Duration;

    struct Harness {
        controller: VoiceController,
        clock: ManualClock,
        media: RecordingMedia,
        log: Arc<Mutex<FakeLog>>,
        engine_rx: mpsc::UnboundedReceiver<EngineMessage>,
        event_rx: broadcast::Receiver<VoiceEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_factory(FakeFactory::new())
        }

        fn with_factory(factory: FakeFactory) -> Self {
            let config = test_config();
            let clock = ManualClock::new();
            let media = RecordingMedia::default();
            let log = factory.log();
            let (engine_tx, engine_rx) = mpsc::unbounded_channel();
            let (event_tx, event_rx) = broadcast::channel(64);

            let controller = VoiceController::new(
                &config,
                Box::new(factory),
                engine_tx,
                Box::new(media.clone()),
                event_tx,
                Arc::new(clock.clone()),
            );

            Self {
                controller,
                clock,
                media,
                log,
                engine_rx,
                event_rx,
            }
        }

        /// Start the session and have the engine confirm
        fn listening() -> Self {
            let mut harness = Self::new();
            harness.controller.handle_input(ControlInput::Start);
            harness.engine(EngineEvent::Started);
            harness
        }

        /// Emit from the newest engine instance and deliver everything queued
        fn engine(&mut self, event: EngineEvent) {
            let sink = self.log.lock().unwrap().sinks.last().cloned().unwrap();
            sink.emit(event);
            self.pump();
        }

        fn say(&mut self, text: &str) {
            self.engine(EngineEvent::Result {
                alternatives: vec![Alternative {
                    transcript: text.to_string(),
                    is_final: true,
                }],
            });
        }

        fn pump(&mut self) {
            while let Ok(message) = self.engine_rx.try_recv() {
                self.controller.handle_engine(message);
            }
        }

        fn advance(&mut self, millis: u64) {
            self.clock.advance(Duration::from_millis(millis));
            self.controller.poll();
        }

        fn events(&mut self) -> Vec<VoiceEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.event_rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn test_config() -> Config {
        Config {
            socket_path: "/tmp/heychef-test.sock".into(),
            data_dir: "/tmp/heychef-test".into(),
            language: "en-US".to_string(),
            recognizer_command: None,
            recognizer_args: Vec::new(),
            autostart: true,
            timing: Default::default(),
        }
    }

    #[test]
    fn test_wake_phrase_and_command_end_to_end() {
        let mut h = Harness::listening();
        h.events();

        h.say("Hey Chef pause");

        assert_eq!(h.media.calls(), vec!["pause"]);
        assert_eq!(h.controller.status().gate, GateState::Armed);
        assert_eq!(h.controller.status().feedback.as_deref(), Some("Paused"));
        assert_eq!(h.controller.status().last_command.as_deref(), Some("pause"));

        let events = h.events();
        assert!(events.contains(&VoiceEvent::Feedback {
            text: "Paused".to_string()
        }));
        assert!(events.contains(&VoiceEvent::CommandRecognized {
            command: Command::Pause,
            text: "pause".to_string(),
        }));
    }

    #[test]
    fn test_window_expires_without_effect() {
        let mut h = Harness::listening();
        h.say("hey chef");
        assert_eq!(h.controller.status().gate, GateState::CommandWindowOpen);

        h.advance(4999);
        assert_eq!(h.controller.status().gate, GateState::CommandWindowOpen);
        h.advance(1);
        assert_eq!(h.controller.status().gate, GateState::Armed);

        h.say("pause");
        assert!(h.media.calls().is_empty());
        assert!(h.events().contains(&VoiceEvent::CommandWindowClosed {
            reason: WindowCloseReason::Expired
        }));
    }

    #[test]
    fn test_command_after_unpolled_expiry_is_ignored() {
        let mut h = Harness::listening();
        h.say("hey chef");
        h.events();

        h.clock.advance(Duration::from_millis(6000));
        h.say("pause");

        assert!(h.media.calls().is_empty());
        assert_eq!(h.controller.status().gate, GateState::Armed);
        assert_eq!(
            h.events(),
            vec![
                VoiceEvent::Transcript {
                    text: "pause".to_string(),
                    is_final: true,
                },
                VoiceEvent::CommandWindowClosed {
                    reason: WindowCloseReason::Expired
                },
            ]
        );
    }

    #[test]
    fn test_second_utterance_within_window() {
        let mut h = Harness::listening();
        h.say("hey chef");
        h.advance(2000);
        h.say("play from 2:30");

        assert_eq!(h.media.calls(), vec!["time=150", "play"]);
        assert_eq!(h.controller.status().feedback.as_deref(), Some("Playing from 2:30"));
    }

    #[test]
    fn test_feedback_clears_after_display_time() {
        let mut h = Harness::listening();
        h.say("hey chef mute");
        h.advance(2000);

        assert_eq!(h.controller.status().feedback, None);
        assert!(h.events().contains(&VoiceEvent::FeedbackCleared));
        assert_eq!(h.controller.next_deadline(), None);
    }

    #[test]
    fn test_stop_before_engine_start_is_silent() {
        let mut h = Harness::new();
        h.controller.handle_input(ControlInput::Start);
        h.controller.handle_input(ControlInput::Stop);
        h.events();

        h.engine(EngineEvent::Started);
        h.say("hey chef play");
        h.engine(EngineEvent::Ended);
        h.advance(10_000);

        assert!(h.events().is_empty());
        assert!(h.media.calls().is_empty());
        assert_eq!(h.log.lock().unwrap().created.len(), 1);
        assert_eq!(h.controller.status().session, SessionState::Stopped);
    }

    #[test]
    fn test_window_survives_engine_restart() {
        let mut h = Harness::listening();
        h.say("hey chef");
        h.engine(EngineEvent::Ended);
        h.advance(300);
        assert_eq!(h.log.lock().unwrap().created.len(), 2);

        h.engine(EngineEvent::Started);
        h.say("forward");
        assert_eq!(h.media.calls(), vec!["time=10"]);
    }

    #[test]
    fn test_language_change_closes_window() {
        let mut h = Harness::listening();
        h.say("hey chef");
        let english_sink = h.log.lock().unwrap().sinks.last().cloned().unwrap();

        h.controller
            .handle_input(ControlInput::SetLanguage("mr-IN".to_string()));
        let status = h.controller.status();
        assert_eq!(status.gate, GateState::Armed);
        assert_eq!(status.language, "mr-IN");
        assert_eq!(h.log.lock().unwrap().created.last().unwrap().language, "mr-IN");

        // Trailing English utterance from the old engine is not interpreted
        english_sink.emit(EngineEvent::Result {
            alternatives: vec![Alternative {
                transcript: "pause".to_string(),
                is_final: true,
            }],
        });
        h.pump();
        assert!(h.media.calls().is_empty());

        h.engine(EngineEvent::Started);
        h.say("हे शेफ थांबवा");
        assert_eq!(h.media.calls(), vec!["pause"]);
        assert_eq!(h.controller.status().feedback.as_deref(), Some("थांबवले"));

        let events = h.events();
        assert!(events.contains(&VoiceEvent::CommandWindowClosed {
            reason: WindowCloseReason::LanguageChanged
        }));
    }

    #[test]
    fn test_stop_listening_command_stops_session() {
        let mut h = Harness::listening();
        h.say("hey chef stop listening");

        let status = h.controller.status();
        assert_eq!(status.session, SessionState::Stopped);
        assert_eq!(status.gate, GateState::Idle);
        assert_eq!(status.feedback.as_deref(), Some("Voice control stopped"));
        assert!(h.media.calls().is_empty());

        h.engine(EngineEvent::Ended);
        h.advance(1000);
        assert_eq!(h.log.lock().unwrap().created.len(), 1);
    }

    #[test]
    fn test_permission_denied_is_surfaced() {
        let mut h = Harness::listening();
        h.say("hey chef");
        h.engine(EngineEvent::Error(crate::session::EngineErrorCode::PermissionDenied));
        h.engine(EngineEvent::Ended);
        h.advance(1000);

        let status = h.controller.status();
        assert!(status.permission_denied);
        assert_eq!(status.session, SessionState::Stopped);
        assert_eq!(status.gate, GateState::Idle);
        assert_eq!(h.log.lock().unwrap().created.len(), 1);
        assert!(h.events().contains(&VoiceEvent::PermissionDenied));
    }

    #[test]
    fn test_unsupported_platform_reports_capability() {
        let mut h = Harness::with_factory(FakeFactory::new().unsupported());
        h.controller.handle_input(ControlInput::Start);

        let status = h.controller.status();
        assert!(!status.supported);
        assert_eq!(status.session, SessionState::Stopped);
    }

    #[test]
    fn test_interim_text_is_displayed_only() {
        let mut h = Harness::listening();
        h.events();
        h.engine(EngineEvent::Result {
            alternatives: vec![Alternative {
                transcript: "hey chef pau".to_string(),
                is_final: false,
            }],
        });

        assert!(h.media.calls().is_empty());
        assert_eq!(h.controller.status().gate, GateState::Armed);
        assert_eq!(
            h.events(),
            vec![VoiceEvent::Transcript {
                text: "hey chef pau".to_string(),
                is_final: false,
            }]
        );
    }

    #[test]
    fn test_status_watch_follows_steps() {
        let mut h = Harness::listening();
        let status_rx = h.controller.subscribe_status();
        h.say("hey chef");
        assert_eq!(status_rx.borrow().gate, GateState::CommandWindowOpen);
    }

    #[tokio::test]
    async fn test_run_drives_pipeline_and_tears_down() {
        let factory = FakeFactory::new();
        let log = factory.log();
        let media = RecordingMedia::default();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (event_tx, _event_rx) = broadcast::channel(64);
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let mut controller = VoiceController::new(
            &test_config(),
            Box::new(factory),
            engine_tx,
            Box::new(media.clone()),
            event_tx,
            Arc::new(SystemClock),
        );
        let mut status_rx = controller.subscribe_status();

        let handle = tokio::spawn(async move {
            controller.run(input_rx, engine_rx).await;
            controller
        });

        input_tx.send(ControlInput::Start).unwrap();
        while log.lock().unwrap().sinks.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let sink = log.lock().unwrap().sinks[0].clone();
        sink.emit(EngineEvent::Started);
        sink.emit(EngineEvent::Result {
            alternatives: vec![Alternative {
                transcript: "hey chef play".to_string(),
                is_final: true,
            }],
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            status_rx.wait_for(|status| status.feedback.is_some()),
        )
        .await
        .unwrap()
        .unwrap();

        drop(input_tx);
        let controller = tokio_test::assert_ok!(handle.await);
        assert_eq!(media.calls(), vec!["play"]);
        assert_eq!(controller.status().session, SessionState::Stopped);
        assert_eq!(log.lock().unwrap().stops, 1);
    }
}
