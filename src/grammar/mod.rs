//! Command grammar: normalized transcript text to a playback command
//!
//! Matching is keyword based and runs in a fixed priority order so that
//! specific phrases are tried before the general ones that would shadow them:
//! - timestamp seek (`2:30`, `2 30`), never part of a longer number
//! - explicit speeds, which also contain play-adjacent words
//! - stop listening, which contains "stop" and (in Marathi) the mute phrase
//! - unmute before mute, since "mute" is inside "unmute"
//! - play, pause, forward, backward

mod command;

pub use command::{Command, CommandKind};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::locale::LocaleEntry;

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{1,2})[:\s]([0-9]{2})(?:[^0-9]|$)")
        .expect("timestamp pattern is valid")
});

/// Keyword checks after the timestamp seek, highest priority first
const KEYWORD_ORDER: &[(CommandKind, Command)] = &[
    (CommandKind::Speed2, Command::Speed2),
    (CommandKind::Speed1_5, Command::Speed1_5),
    (CommandKind::SpeedNormal, Command::SpeedNormal),
    (CommandKind::StopListening, Command::StopListening),
    (CommandKind::Unmute, Command::Unmute),
    (CommandKind::Mute, Command::Mute),
    (CommandKind::Play, Command::Play),
    (CommandKind::Pause, Command::Pause),
    (CommandKind::Forward, Command::Forward),
    (CommandKind::Backward, Command::Backward),
];

/// Map transcript text to at most one command
pub fn parse_command(text: &str, locale: &LocaleEntry) -> Option<Command> {
    let text = locale.normalize_numerals(&text.trim().to_lowercase());
    if text.is_empty() {
        return None;
    }

    if let Some(seconds) = parse_timestamp(&text) {
        return Some(Command::SeekTo { seconds });
    }

    KEYWORD_ORDER
        .iter()
        .find(|(kind, _)| locale.mentions(&text, *kind))
        .map(|(_, command)| *command)
}

/// Extract `minutes[:\s]seconds` as a total in seconds
///
/// Seconds are clamped to 59.
pub fn parse_timestamp(text: &str) -> Option<u32> {
    let caps = TIMESTAMP.captures(text)?;
    let minutes: u32 = caps.get(1)?.as_str().parse().ok()?;
    let seconds: u32 = caps.get(2)?.as_str().parse().ok()?;
    Some(minutes * 60 + seconds.min(59))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::LocaleTable;
    use pretty_assertions::assert_eq;

    fn en() -> &'static LocaleEntry {
        LocaleTable::builtin().resolve("en-US")
    }

    fn mr() -> &'static LocaleEntry {
        LocaleTable::builtin().resolve("mr-IN")
    }

    #[test]
    fn test_play_from_timestamp() {
        assert_eq!(parse_command("play from 2:30", en()), Some(Command::SeekTo { seconds: 150 }));
        assert_eq!(parse_command("play from 2 30", en()), Some(Command::SeekTo { seconds: 150 }));
        assert_eq!(parse_command("go to 12:05", en()), Some(Command::SeekTo { seconds: 725 }));
    }

    #[test]
    fn test_timestamp_seconds_clamped() {
        assert_eq!(parse_timestamp("1:75"), Some(119));
        assert_eq!(parse_timestamp("0:00"), Some(0));
        assert_eq!(parse_timestamp("no numbers here"), None);
        assert_eq!(parse_timestamp("speed 1.5"), None);
    }

    #[test]
    fn test_timestamp_not_cut_from_longer_numbers() {
        assert_eq!(parse_timestamp("play from 100:20"), None);
        assert_eq!(parse_timestamp("skip to 2:305"), None);
        assert_eq!(parse_command("play from 100:20", en()), Some(Command::Play));
        assert_eq!(parse_command("(3:15)", en()), Some(Command::SeekTo { seconds: 195 }));
    }

    #[test]
    fn test_speed_phrases_beat_play() {
        assert_eq!(parse_command("speed 2", en()), Some(Command::Speed2));
        assert_eq!(parse_command("play at 2x", en()), Some(Command::Speed2));
        assert_eq!(parse_command("play 1.5x", en()), Some(Command::Speed1_5));
        assert_eq!(parse_command("speed 1.5", en()), Some(Command::Speed1_5));
        assert_eq!(parse_command("normal speed please", en()), Some(Command::SpeedNormal));
        assert_eq!(parse_command("speed 1", en()), Some(Command::SpeedNormal));
    }

    #[test]
    fn test_unmute_never_mute() {
        assert_eq!(parse_command("unmute", en()), Some(Command::Unmute));
        assert_eq!(parse_command("please unmute the video", en()), Some(Command::Unmute));
        assert_eq!(parse_command("mute", en()), Some(Command::Mute));
        assert_eq!(parse_command("अनम्यूट", mr()), Some(Command::Unmute));
    }

    #[test]
    fn test_stop_listening_is_not_pause() {
        assert_eq!(parse_command("stop listening", en()), Some(Command::StopListening));
        assert_eq!(parse_command("stop", en()), Some(Command::Pause));
        assert_eq!(parse_command("आवाज बंद करा", mr()), Some(Command::StopListening));
        assert_eq!(parse_command("आवाज बंद", mr()), Some(Command::Mute));
    }

    #[test]
    fn test_basic_keywords() {
        assert_eq!(parse_command("play", en()), Some(Command::Play));
        assert_eq!(parse_command("  Start The Video ", en()), Some(Command::Play));
        assert_eq!(parse_command("pause", en()), Some(Command::Pause));
        assert_eq!(parse_command("forward", en()), Some(Command::Forward));
        assert_eq!(parse_command("rewind a bit", en()), Some(Command::Backward));
        assert_eq!(parse_command("go backward", en()), Some(Command::Backward));
    }

    #[test]
    fn test_marathi_keywords() {
        assert_eq!(parse_command("व्हिडिओ सुरू करा", mr()), Some(Command::Play));
        assert_eq!(parse_command("थांबवा", mr()), Some(Command::Pause));
        assert_eq!(parse_command("पुढे", mr()), Some(Command::Forward));
        assert_eq!(parse_command("मागे", mr()), Some(Command::Backward));
        assert_eq!(parse_command("वेग वाढवा", mr()), Some(Command::Speed2));
        assert_eq!(parse_command("आवाज सुरू करा", mr()), Some(Command::Unmute));
    }

    #[test]
    fn test_devanagari_timestamp() {
        assert_eq!(parse_command("२:३० पासून", mr()), Some(Command::SeekTo { seconds: 150 }));
    }

    #[test]
    fn test_locale_scopes_synonyms() {
        assert_eq!(parse_command("थांबवा", en()), None);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(parse_command("how much salt", en()), None);
        assert_eq!(parse_command("   ", en()), None);
    }
}
