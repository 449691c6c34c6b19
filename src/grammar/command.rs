//! Discrete playback commands

use serde::{Deserialize, Serialize};

/// Command kinds used as keys in the locale table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Play,
    Pause,
    Mute,
    Unmute,
    Forward,
    Backward,
    SeekTo,
    SpeedNormal,
    #[serde(rename = "speed_1_5")]
    Speed1_5,
    #[serde(rename = "speed_2")]
    Speed2,
    StopListening,
}

/// A recognized command, with its payload where it has one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    Play,
    Pause,
    Mute,
    Unmute,
    Forward,
    Backward,
    /// Absolute seek, in whole seconds
    SeekTo { seconds: u32 },
    SpeedNormal,
    #[serde(rename = "speed_1_5")]
    Speed1_5,
    #[serde(rename = "speed_2")]
    Speed2,
    StopListening,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Play => CommandKind::Play,
            Command::Pause => CommandKind::Pause,
            Command::Mute => CommandKind::Mute,
            Command::Unmute => CommandKind::Unmute,
            Command::Forward => CommandKind::Forward,
            Command::Backward => CommandKind::Backward,
            Command::SeekTo { .. } => CommandKind::SeekTo,
            Command::SpeedNormal => CommandKind::SpeedNormal,
            Command::Speed1_5 => CommandKind::Speed1_5,
            Command::Speed2 => CommandKind::Speed2,
            Command::StopListening => CommandKind::StopListening,
        }
    }

    /// Fixed playback rate for speed commands
    pub fn playback_rate(&self) -> Option<f64> {
        match self {
            Command::SpeedNormal => Some(1.0),
            Command::Speed1_5 => Some(1.5),
            Command::Speed2 => Some(2.0),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Play => write!(f, "PLAY"),
            Command::Pause => write!(f, "PAUSE"),
            Command::Mute => write!(f, "MUTE"),
            Command::Unmute => write!(f, "UNMUTE"),
            Command::Forward => write!(f, "FORWARD"),
            Command::Backward => write!(f, "BACKWARD"),
            Command::SeekTo { seconds } => write!(f, "SEEK_TO ({}s)", seconds),
            Command::SpeedNormal => write!(f, "SPEED_NORMAL"),
            Command::Speed1_5 => write!(f, "SPEED_1_5"),
            Command::Speed2 => write!(f, "SPEED_2"),
            Command::StopListening => write!(f, "STOP_LISTENING"),
        }
    }
}
