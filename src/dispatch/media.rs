//! Media surface seam and the remote player implementation

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Errors from driving the media surface
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediaError {
    #[error("no media element is mounted")]
    NotMounted,

    #[error("media element rejected the request: {0}")]
    Rejected(String),
}

/// The playback controls voice commands act on
pub trait MediaSurface: Send {
    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self) -> Result<(), MediaError>;

    fn set_muted(&mut self, muted: bool) -> Result<(), MediaError>;

    /// Position in seconds
    fn current_time(&self) -> Result<f64, MediaError>;

    fn set_current_time(&mut self, seconds: f64) -> Result<(), MediaError>;

    fn set_playback_rate(&mut self, rate: f64) -> Result<(), MediaError>;
}

/// Player state as last reported by the UI client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_time: f64,
    pub paused: bool,
    pub muted: bool,
    pub playback_rate: f64,
    /// Total length in seconds, when known
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            paused: true,
            muted: false,
            playback_rate: 1.0,
            duration: None,
        }
    }
}

/// Side effects pushed to the UI client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MediaAction {
    Play,
    Pause,
    SetMuted { muted: bool },
    Seek { seconds: f64 },
    SetPlaybackRate { rate: f64 },
}

/// Media surface living in a UI client connected over IPC
///
/// Keeps a mirror of the client's player so relative seeks work without a
/// round trip, and publishes every side effect as a `MediaAction`.
#[derive(Debug, Clone)]
pub struct RemoteMedia {
    mirror: Arc<Mutex<Option<PlaybackState>>>,
    action_tx: broadcast::Sender<MediaAction>,
}

impl RemoteMedia {
    pub fn new(capacity: usize) -> Self {
        let (action_tx, _) = broadcast::channel(capacity);
        Self {
            mirror: Arc::new(Mutex::new(None)),
            action_tx,
        }
    }

    /// Receive every action applied from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MediaAction> {
        self.action_tx.subscribe()
    }

    /// The client mounted a player or reported its position
    pub fn report(&self, state: PlaybackState) {
        trace!(?state, "playback reported");
        *self.lock() = Some(state);
    }

    /// The client's player went away
    pub fn detach(&self) {
        debug!("media detached");
        *self.lock() = None;
    }

    /// Snapshot of the mirrored player
    pub fn snapshot(&self) -> Option<PlaybackState> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<PlaybackState>> {
        self.mirror.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, action: MediaAction) -> Result<(), MediaError> {
        {
            let mut mirror = self.lock();
            let state = mirror.as_mut().ok_or(MediaError::NotMounted)?;
            match &action {
                MediaAction::Play => state.paused = false,
                MediaAction::Pause => state.paused = true,
                MediaAction::SetMuted { muted } => state.muted = *muted,
                MediaAction::Seek { seconds } => state.current_time = *seconds,
                MediaAction::SetPlaybackRate { rate } => state.playback_rate = *rate,
            }
        }

        if self.action_tx.send(action).is_err() {
            trace!("no client subscribed to media actions");
        }
        Ok(())
    }
}

impl MediaSurface for RemoteMedia {
    fn play(&mut self) -> Result<(), MediaError> {
        self.apply(MediaAction::Play)
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        self.apply(MediaAction::Pause)
    }

    fn set_muted(&mut self, muted: bool) -> Result<(), MediaError> {
        self.apply(MediaAction::SetMuted { muted })
    }

    fn current_time(&self) -> Result<f64, MediaError> {
        self.lock()
            .as_ref()
            .map(|state| state.current_time)
            .ok_or(MediaError::NotMounted)
    }

    fn set_current_time(&mut self, seconds: f64) -> Result<(), MediaError> {
        if !seconds.is_finite() {
            return Err(MediaError::Rejected(format!("invalid position {seconds}")));
        }
        let duration = self.lock().as_ref().and_then(|state| state.duration);
        let seconds = match duration {
            Some(duration) => seconds.clamp(0.0, duration.max(0.0)),
            None => seconds.max(0.0),
        };
        self.apply(MediaAction::Seek { seconds })
    }

    fn set_playback_rate(&mut self, rate: f64) -> Result<(), MediaError> {
        self.apply(MediaAction::SetPlaybackRate { rate })
    }
}
