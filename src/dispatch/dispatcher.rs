//! Applies recognized commands to the media surface

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::grammar::Command;
use crate::locale::LocaleEntry;

use super::media::{MediaError, MediaSurface};

/// Transient text shown after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub text: String,
    pub created_at: Instant,
}

/// Result of dispatching one command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dispatched {
    /// Feedback shown for the command, if it took effect
    pub feedback: Option<String>,
    /// The session must be stopped
    pub stop_listening: bool,
}

pub struct CommandDispatcher {
    feedback: Option<FeedbackMessage>,
    display_for: Duration,
    seek_step_secs: f64,
}

impl CommandDispatcher {
    pub fn new(display_for: Duration, seek_step_secs: f64) -> Self {
        Self {
            feedback: None,
            display_for,
            seek_step_secs,
        }
    }

    /// Apply `command`; media failures are logged and swallowed
    pub fn dispatch(
        &mut self,
        command: Command,
        media: &mut dyn MediaSurface,
        locale: &LocaleEntry,
        now: Instant,
    ) -> Dispatched {
        if let Err(e) = self.apply(command, media) {
            warn!(%command, ?e, "voice command had no effect");
            return Dispatched::default();
        }

        let text = self.feedback_text(command, locale);
        info!(%command, feedback = %text, "voice command applied");
        self.feedback = Some(FeedbackMessage {
            text: text.clone(),
            created_at: now,
        });

        Dispatched {
            feedback: Some(text),
            stop_listening: command == Command::StopListening,
        }
    }

    /// Feedback still on screen at `now`
    pub fn current_feedback(&self, now: Instant) -> Option<&FeedbackMessage> {
        self.feedback
            .as_ref()
            .filter(|message| now < message.created_at + self.display_for)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.feedback
            .as_ref()
            .map(|message| message.created_at + self.display_for)
    }

    /// Drop expired feedback; returns true when something was cleared
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_deadline() {
            Some(deadline) if deadline <= now => {
                self.feedback = None;
                true
            }
            _ => false,
        }
    }

    fn apply(&self, command: Command, media: &mut dyn MediaSurface) -> Result<(), MediaError> {
        match command {
            Command::Play => media.play(),
            Command::Pause => media.pause(),
            Command::Mute => media.set_muted(true),
            Command::Unmute => media.set_muted(false),
            Command::Forward => {
                let position = media.current_time()?;
                media.set_current_time(position + self.seek_step_secs)
            }
            Command::Backward => {
                let position = media.current_time()?;
                media.set_current_time((position - self.seek_step_secs).max(0.0))
            }
            Command::SeekTo { seconds } => {
                media.set_current_time(f64::from(seconds))?;
                media.play()
            }
            Command::SpeedNormal | Command::Speed1_5 | Command::Speed2 => {
                let rate = command.playback_rate().unwrap_or(1.0);
                media.set_playback_rate(rate)?;
                media.play()
            }
            Command::StopListening => Ok(()),
        }
    }

    fn feedback_text(&self, command: Command, locale: &LocaleEntry) -> String {
        let template = locale
            .feedback_template(command.kind())
            .unwrap_or_default();

        let step = locale.localize_numerals(&format_seconds(self.seek_step_secs));
        let mut text = template.replace("{step}", &step);
        if let Command::SeekTo { seconds } = command {
            let time = format!("{}:{:02}", seconds / 60, seconds % 60);
            text = text.replace("{time}", &locale.localize_numerals(&time));
        }
        if text.is_empty() {
            text = command.to_string();
        }
        text
    }
}

fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as i64)
    } else {
        format!("{seconds}")
    }
}
