//! Command dispatch module
//!
//! Turns recognized commands into media side effects and short-lived
//! feedback text.

mod dispatcher;
mod media;

pub use dispatcher::CommandDispatcher;
pub use media::{MediaAction, MediaSurface, PlaybackState, RemoteMedia};

#[cfg(test)]
pub(crate) use dispatcher::tests::RecordingMedia;
