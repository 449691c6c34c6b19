//! Recognition session module
//!
//! Owns the platform speech engine and keeps it listening:
//! - `engine`: the seam to a platform engine (factory, instance, events)
//! - `recognition`: the session state machine with debounced auto-restart
//! - `process`: the production engine, an external recognizer process

mod engine;
#[cfg(test)]
pub(crate) mod fake;
mod process;
mod recognition;

pub use engine::{Alternative, EngineErrorCode, EngineEvent, EngineFactory, EngineMessage};
pub use process::CommandEngineFactory;
pub use recognition::{RecognitionEvent, RecognitionSession, SessionOutput, SessionState};
