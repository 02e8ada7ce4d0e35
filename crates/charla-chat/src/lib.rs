//! Charla Chat crate - the conversation turn flow.
//!
//! Normalizes utterances, resolves upstream sessions, dispatches turns to the
//! dialogue service and renders replies for display. Hosts drive all of it
//! through [`ConversationOrchestrator`] with a [`TurnProfile`].

pub mod broker;
pub mod dispatcher;
pub mod error;
pub mod normalizer;
pub mod orchestrator;
pub mod render;
pub mod voice;

pub use broker::SessionBroker;
pub use dispatcher::{ReplyDispatcher, TurnOptions};
pub use error::ChatError;
pub use normalizer::{
    clean_text, normalize, number_for_word, words_to_numbers, JoinStyle, NormalizerOptions,
};
pub use orchestrator::{
    is_exit_command, ConversationOrchestrator, OrchestratorSettings, TurnOutcome, TurnProfile,
    VoiceOutcome,
};
pub use render::{render, render_lines, DisplayLine};
pub use voice::VoicePipeline;
