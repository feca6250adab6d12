//! Turn-taking conversation
//!
//! A state machine that sequences recording, silence-based end-of-turn
//! detection, transcription, reply generation, and speech playback.

pub mod messages;
pub mod orchestrator;
pub mod recorder;
pub mod silence;
pub mod state;

pub use messages::{ConversationMessage, MessageLog, Role};
pub use orchestrator::{ConversationServices, Orchestrator, TurnOutcome};
pub use recorder::Recorder;
pub use silence::SilenceDetector;
pub use state::{ConversationState, StateCell};
