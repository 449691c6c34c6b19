//! Wake-word gate state machine
//!
//! Handles transitions between Idle, Armed and CommandWindowOpen based on
//! final transcripts, session lifecycle and the window countdown.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::grammar::{parse_command, Command};
use crate::locale::LocaleEntry;
use crate::session::RecognitionEvent;

/// The three states of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Session is not listening
    #[default]
    Idle,
    /// Listening, wake phrase not yet heard
    Armed,
    /// Wake phrase heard, next utterance is a command candidate
    CommandWindowOpen,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateState::Idle => write!(f, "Idle"),
            GateState::Armed => write!(f, "Armed"),
            GateState::CommandWindowOpen => write!(f, "CommandWindowOpen"),
        }
    }
}

/// A command that made it through the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatedCommand {
    pub command: Command,
    /// The text the command was parsed from
    pub text: String,
}

/// What a single transcript did to the gate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateOutcome {
    /// The window had run out before this utterance was considered
    pub expired: bool,
    /// Wake phrase matched in this utterance
    pub wake_phrase: Option<&'static str>,
    pub command: Option<GatedCommand>,
}

pub struct WakeWordGate {
    state: GateState,
    window: Duration,
    /// Countdown for the open command window
    deadline: Option<Instant>,
}

impl WakeWordGate {
    pub fn new(window: Duration) -> Self {
        Self {
            state: GateState::Idle,
            window,
            deadline: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The session started listening
    pub fn on_session_listening(&mut self) {
        if self.state == GateState::Idle {
            self.transition_to(GateState::Armed);
        }
    }

    /// The session stopped; returns true if a window was open
    pub fn on_session_stopped(&mut self) -> bool {
        let was_open = self.state == GateState::CommandWindowOpen;
        self.deadline = None;
        self.transition_to(GateState::Idle);
        was_open
    }

    /// The active locale changed; returns true if a window was closed
    pub fn on_locale_changed(&mut self) -> bool {
        if self.state != GateState::CommandWindowOpen {
            return false;
        }
        self.close_window();
        true
    }

    /// Feed one transcript; interim text never opens or consumes a window
    pub fn on_event(
        &mut self,
        event: &RecognitionEvent,
        locale: &LocaleEntry,
        now: Instant,
    ) -> GateOutcome {
        let mut outcome = GateOutcome {
            expired: self.poll(now),
            ..GateOutcome::default()
        };
        if !event.is_final || self.state == GateState::Idle {
            return outcome;
        }

        let text = event.text.trim().to_lowercase();
        let candidate = match find_wake_phrase(&text, locale) {
            Some((phrase, rest)) => {
                info!(phrase, "wake phrase detected");
                self.open_window(now);
                outcome.wake_phrase = Some(phrase);
                rest
            }
            None if self.state == GateState::CommandWindowOpen => text.as_str(),
            None => return outcome,
        };

        if candidate.is_empty() {
            return outcome;
        }

        match parse_command(candidate, locale) {
            Some(command) => {
                debug!(%command, text = candidate, "command accepted");
                self.close_window();
                outcome.command = Some(GatedCommand {
                    command,
                    text: candidate.to_string(),
                });
            }
            None => debug!(text = candidate, "no command in utterance, window stays open"),
        }

        outcome
    }

    /// Expire the window if its countdown ran out; returns true on expiry
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                debug!("command window expired");
                self.close_window();
                true
            }
            _ => false,
        }
    }

    fn open_window(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
        self.transition_to(GateState::CommandWindowOpen);
    }

    fn close_window(&mut self) {
        self.deadline = None;
        self.transition_to(GateState::Armed);
    }

    fn transition_to(&mut self, new_state: GateState) {
        if self.state != new_state {
            info!(from = %self.state, to = %new_state, "gate transition");
            self.state = new_state;
        }
    }
}

/// First wake phrase (in locale order) contained in `text`, and the text after it
fn find_wake_phrase<'t>(text: &'t str, locale: &LocaleEntry) -> Option<(&'static str, &'t str)> {
    locale.wake_phrases.iter().find_map(|phrase| {
        text.find(phrase).map(|index| {
            let rest = text[index + phrase.len()..]
                .trim_start_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || c == '।')
                .trim_end();
            (*phrase, rest)
        })
    })
}
