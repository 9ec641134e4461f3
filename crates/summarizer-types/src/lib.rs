//! Shared types for the channel summarizer bot

pub mod errors;
pub mod session;
pub mod types;

pub use errors::FetchError;
pub use session::{SessionHandle, SessionState};
pub use types::*;
