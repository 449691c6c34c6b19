//! Wake-word gate module
//!
//! Only final transcripts that follow a wake phrase reach the command
//! grammar:
//! - Idle: session not listening
//! - Armed: listening, waiting for the wake phrase
//! - CommandWindowOpen: bounded window after the wake phrase

mod machine;

pub use machine::{GateState, WakeWordGate};
