//! Controller module owning the voice pipeline
//!
//! One task, one timeline: session, gate and dispatcher are only touched by
//! the controller, which consumes control inputs, engine messages and its
//! own deadlines.

mod voice;

pub use voice::{ControlInput, VoiceController, VoiceStatus};
