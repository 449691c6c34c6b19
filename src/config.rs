//! Configuration loading and management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Longest accepted timing value; deadlines are `Instant + Duration`
const MAX_TIMING_MS: u64 = 24 * 60 * 60 * 1000;

/// Timing knobs for the voice pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTiming {
    /// How long the command window stays open after the wake phrase
    pub wake_window: Duration,
    /// Debounce before restarting an engine that ended on its own
    pub restart_delay: Duration,
    /// How long a feedback message stays visible
    pub feedback_duration: Duration,
    /// Step for relative forward/backward seeks, in seconds
    pub seek_step_secs: f64,
}

impl Default for VoiceTiming {
    fn default() -> Self {
        Self {
            wake_window: Duration::from_millis(5000),
            restart_delay: Duration::from_millis(300),
            feedback_duration: Duration::from_millis(2000),
            seek_step_secs: 10.0,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Language tag the session starts with
    pub language: String,

    /// External recognizer program; `None` means voice control is unsupported
    pub recognizer_command: Option<String>,

    /// Extra arguments passed to the recognizer
    pub recognizer_args: Vec<String>,

    /// Start listening as soon as the daemon is up
    pub autostart: bool,

    pub timing: VoiceTiming,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("heychef");

        let socket_path = lookup("HEYCHEF_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("voiced.sock"));

        let language = lookup("HEYCHEF_LANG")
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "en-US".to_string());

        let recognizer_command = lookup("HEYCHEF_RECOGNIZER")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let recognizer_args = lookup("HEYCHEF_RECOGNIZER_ARGS")
            .map(|a| a.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let autostart = match lookup("HEYCHEF_AUTOSTART") {
            Some(v) => parse_bool(&v).with_context(|| format!("invalid HEYCHEF_AUTOSTART: {v}"))?,
            None => true,
        };

        let defaults = VoiceTiming::default();
        let timing = VoiceTiming {
            wake_window: parse_millis(&lookup, "HEYCHEF_WAKE_WINDOW_MS")?
                .unwrap_or(defaults.wake_window),
            restart_delay: parse_millis(&lookup, "HEYCHEF_RESTART_DELAY_MS")?
                .unwrap_or(defaults.restart_delay),
            feedback_duration: parse_millis(&lookup, "HEYCHEF_FEEDBACK_MS")?
                .unwrap_or(defaults.feedback_duration),
            seek_step_secs: parse_number::<f64, _>(&lookup, "HEYCHEF_SEEK_STEP_SECS")?
                .unwrap_or(defaults.seek_step_secs),
        };

        Ok(Self {
            socket_path,
            data_dir,
            language,
            recognizer_command,
            recognizer_args,
            autostart,
            timing,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("invalid {key}: {raw}"))
        })
        .transpose()
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_number::<u64, _>(lookup, key)? {
        Some(ms) if ms > MAX_TIMING_MS => {
            anyhow::bail!("invalid {key}: {ms} exceeds {MAX_TIMING_MS} ms")
        }
        ms => Ok(ms.map(Duration::from_millis)),
    }
}
