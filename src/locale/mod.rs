//! Locale table for wake phrases and command synonyms
//!
//! Static, immutable data keyed by language tag. The active entry is held as
//! a `&'static LocaleEntry`, so swapping languages is a single reference
//! assignment.

mod table;

pub use table::{LocaleEntry, LocaleTable};
