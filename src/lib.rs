//! Rapport - real-time nonverbal signal scoring for spoken conversation sessions
//!
//! Rapport turns per-frame body, hand, and face keypoints into a timeline of
//! feature snapshots and scores them into communication axes, while a
//! turn-taking orchestrator runs the spoken conversation alongside:
//! keypoints → normalization → timeline → live/final scoring → export.
//!
//! ## Modules
//!
//! - **Signal path**: [`normalizer`], [`timeline`], [`scoring`], [`analyzer`], [`capture`]
//! - **Conversation**: [`conversation`] (state machine, recorder, silence detection)
//! - **Session**: [`session`] ties both together and produces the final result and export

pub mod analyzer;
pub mod capture;
pub mod config;
pub mod conversation;
pub mod error;
pub mod export;
pub mod normalizer;
pub mod scoring;
pub mod services;
pub mod session;
pub mod timeline;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use analyzer::{FrameAnalyzer, SharedAnalyzer};
pub use capture::{run_capture_loop, CaptureDetectors, CaptureStats};
pub use config::RapportConfig;
pub use conversation::{ConversationServices, ConversationState, Orchestrator, TurnOutcome};
pub use error::RapportError;
pub use export::SessionRecordEncoder;
pub use normalizer::KeypointNormalizer;
pub use scoring::{CommunicationType, FinalResult, ScoreEngine};
pub use session::Session;
pub use timeline::Timeline;

/// Rapport version reported by the CLI
pub const RAPPORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and FFI
pub const PRODUCER_NAME: &str = "rapport";
