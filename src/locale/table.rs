//! Built-in locale entries and tag resolution

use tracing::warn;

use crate::grammar::CommandKind;

/// Wake phrases, synonyms and feedback text for one language
#[derive(Debug)]
pub struct LocaleEntry {
    /// BCP 47 tag, e.g. `en-US`
    pub language_tag: &'static str,
    /// Tried in order; first substring match wins
    pub wake_phrases: &'static [&'static str],
    /// Lower-case keywords per command
    pub command_synonyms: &'static [(CommandKind, &'static [&'static str])],
    /// Spoken numerals rewritten before timestamp parsing
    pub numeric_words: &'static [(&'static str, &'static str)],
    /// Feedback templates; `{step}` and `{time}` are substituted
    pub feedback: &'static [(CommandKind, &'static str)],
}

impl LocaleEntry {
    /// Keywords for a command, empty when the locale has none
    pub fn synonyms(&self, kind: CommandKind) -> &'static [&'static str] {
        self.command_synonyms
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, words)| *words)
            .unwrap_or(&[])
    }

    /// Whether `text` contains any keyword for `kind`
    pub fn mentions(&self, text: &str, kind: CommandKind) -> bool {
        self.synonyms(kind).iter().any(|word| text.contains(word))
    }

    /// Rewrite locale numerals to ASCII digits
    pub fn normalize_numerals(&self, text: &str) -> String {
        self.numeric_words
            .iter()
            .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
    }

    /// Render ASCII digits with the locale's numerals, for display
    pub fn localize_numerals(&self, text: &str) -> String {
        self.numeric_words
            .iter()
            .fold(text.to_string(), |acc, (native, ascii)| acc.replace(ascii, native))
    }

    /// Feedback template for a command
    pub fn feedback_template(&self, kind: CommandKind) -> Option<&'static str> {
        self.feedback
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, template)| *template)
    }
}

/// Lookup over every built-in locale
#[derive(Debug)]
pub struct LocaleTable {
    entries: &'static [LocaleEntry],
}

static BUILTIN: LocaleTable = LocaleTable {
    entries: &[EN_US, MR_IN],
};

impl LocaleTable {
    /// The table compiled into the daemon
    pub fn builtin() -> &'static LocaleTable {
        &BUILTIN
    }

    /// Exact (case-insensitive) tag lookup
    pub fn get(&self, tag: &str) -> Option<&'static LocaleEntry> {
        let entries: &'static [LocaleEntry] = self.entries;
        let tag = tag.trim();
        entries
            .iter()
            .find(|e| e.language_tag.eq_ignore_ascii_case(tag))
    }

    /// Resolve a tag, falling back to the primary subtag and then to `en-US`
    pub fn resolve(&self, tag: &str) -> &'static LocaleEntry {
        if let Some(entry) = self.get(tag) {
            return entry;
        }

        let entries: &'static [LocaleEntry] = self.entries;
        let primary = tag.trim().split(['-', '_']).next().unwrap_or_default();
        let by_primary = entries.iter().find(|e| {
            e.language_tag
                .split('-')
                .next()
                .is_some_and(|p| p.eq_ignore_ascii_case(primary))
        });

        match by_primary {
            Some(entry) => entry,
            None => {
                warn!(tag, "no locale for language tag, falling back to en-US");
                &entries[0]
            }
        }
    }

    /// Language tags known to the table
    pub fn tags(&self) -> impl Iterator<Item = &'static str> {
        let entries: &'static [LocaleEntry] = self.entries;
        entries.iter().map(|e| e.language_tag)
    }
}

const EN_US: LocaleEntry = LocaleEntry {
    language_tag: "en-US",
    wake_phrases: &["hey chef", "hi chef", "okay chef"],
    command_synonyms: &[
        (CommandKind::Play, &["play", "start", "resume"]),
        (CommandKind::Pause, &["pause", "stop", "hold on"]),
        (CommandKind::Mute, &["mute", "quiet"]),
        (CommandKind::Unmute, &["unmute", "sound on"]),
        (CommandKind::Forward, &["forward", "skip ahead"]),
        (CommandKind::Backward, &["backward", "rewind", "go back"]),
        (CommandKind::Speed2, &["speed 2", "2x", "double speed"]),
        (CommandKind::Speed1_5, &["speed 1.5", "1.5x", "one and a half"]),
        (CommandKind::SpeedNormal, &["normal speed", "play at normal", "speed 1"]),
        (CommandKind::StopListening, &["stop listening", "stop voice control"]),
    ],
    numeric_words: &[],
    feedback: &[
        (CommandKind::Play, "Playing"),
        (CommandKind::Pause, "Paused"),
        (CommandKind::Mute, "Muted"),
        (CommandKind::Unmute, "Unmuted"),
        (CommandKind::Forward, "Forward {step}s"),
        (CommandKind::Backward, "Backward {step}s"),
        (CommandKind::SeekTo, "Playing from {time}"),
        (CommandKind::Speed2, "Playing at 2x"),
        (CommandKind::Speed1_5, "Playing at 1.5x"),
        (CommandKind::SpeedNormal, "Normal speed"),
        (CommandKind::StopListening, "Voice control stopped"),
    ],
};

// Marathi speakers mix English keywords into commands, so both are listed.
const MR_IN: LocaleEntry = LocaleEntry {
    language_tag: "mr-IN",
    wake_phrases: &["हे शेफ", "हाय शेफ", "hey chef"],
    command_synonyms: &[
        (CommandKind::Play, &["सुरू करा", "प्ले", "चालू करा", "play", "start"]),
        (CommandKind::Pause, &["थांबवा", "पॉज", "बंद करा", "pause", "stop"]),
        (CommandKind::Mute, &["आवाज बंद", "म्यूट", "mute"]),
        (CommandKind::Unmute, &["आवाज सुरू", "अनम्यूट", "unmute"]),
        (CommandKind::Forward, &["पुढे", "पुढचा", "forward"]),
        (CommandKind::Backward, &["मागे", "मागचा", "backward", "rewind"]),
        (CommandKind::Speed2, &["वेग वाढवा", "दुप्पट वेग", "speed 2", "2x"]),
        (CommandKind::Speed1_5, &["दीड पट", "speed 1.5", "1.5x"]),
        (CommandKind::SpeedNormal, &["सामान्य वेग", "नॉर्मल", "normal speed", "speed 1"]),
        (
            CommandKind::StopListening,
            &["आवाज नियंत्रण बंद करा", "आवाज बंद करा", "ऐकणे थांबवा", "stop listening"],
        ),
    ],
    numeric_words: &[
        ("०", "0"),
        ("१", "1"),
        ("२", "2"),
        ("३", "3"),
        ("४", "4"),
        ("५", "5"),
        ("६", "6"),
        ("७", "7"),
        ("८", "8"),
        ("९", "9"),
    ],
    feedback: &[
        (CommandKind::Play, "सुरू झाले"),
        (CommandKind::Pause, "थांबवले"),
        (CommandKind::Mute, "आवाज बंद"),
        (CommandKind::Unmute, "आवाज सुरू"),
        (CommandKind::Forward, "{step} सेकंद पुढे"),
        (CommandKind::Backward, "{step} सेकंद मागे"),
        (CommandKind::SeekTo, "{time} पासून सुरू"),
        (CommandKind::Speed2, "वेग २ पट"),
        (CommandKind::Speed1_5, "वेग दीड पट"),
        (CommandKind::SpeedNormal, "सामान्य वेग"),
        (CommandKind::StopListening, "आवाज नियंत्रण बंद"),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup_is_case_insensitive() {
        let table = LocaleTable::builtin();
        assert_eq!(table.get("MR-in").unwrap().language_tag, "mr-IN");
        assert!(table.get("fr-FR").is_none());
    }

    #[test]
    fn test_resolve_falls_back_by_primary_subtag() {
        let table = LocaleTable::builtin();
        assert_eq!(table.resolve("en-GB").language_tag, "en-US");
        assert_eq!(table.resolve("mr").language_tag, "mr-IN");
    }

    #[test]
    fn test_resolve_unknown_defaults_to_english() {
        let table = LocaleTable::builtin();
        assert_eq!(table.resolve("fr-FR").language_tag, "en-US");
    }

    #[test]
    fn test_resolve_returns_same_reference() {
        let table = LocaleTable::builtin();
        assert!(std::ptr::eq(table.resolve("en-US"), table.resolve("en-AU")));
    }

    #[test]
    fn test_every_locale_covers_every_command() {
        let kinds = [
            CommandKind::Play,
            CommandKind::Pause,
            CommandKind::Mute,
            CommandKind::Unmute,
            CommandKind::Forward,
            CommandKind::Backward,
            CommandKind::Speed2,
            CommandKind::Speed1_5,
            CommandKind::SpeedNormal,
            CommandKind::StopListening,
        ];
        let table = LocaleTable::builtin();
        for tag in table.tags() {
            let entry = table.resolve(tag);
            assert!(!entry.wake_phrases.is_empty(), "{tag} has no wake phrase");
            for kind in kinds {
                assert!(!entry.synonyms(kind).is_empty(), "{tag} lacks {kind:?}");
                assert!(entry.feedback_template(kind).is_some(), "{tag} lacks feedback for {kind:?}");
            }
            assert!(entry.feedback_template(CommandKind::SeekTo).is_some());
        }
    }

    #[test]
    fn test_devanagari_digits_normalize() {
        let entry = LocaleTable::builtin().resolve("mr-IN");
        assert_eq!(entry.normalize_numerals("२:३० पासून"), "2:30 पासून");
    }

    #[test]
    fn test_numerals_localize_for_display() {
        let table = LocaleTable::builtin();
        assert_eq!(table.resolve("mr-IN").localize_numerals("2:30"), "२:३०");
        assert_eq!(table.resolve("en-US").localize_numerals("2:30"), "2:30");
    }
}
