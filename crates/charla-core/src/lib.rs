pub mod config;
pub mod error;
pub mod mock;
pub mod services;
pub mod types;

pub use config::CharlaConfig;
pub use error::{CharlaError, Result};
pub use services::{DialogueService, TranscriptionService};
pub use types::*;
