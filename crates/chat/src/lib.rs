//! ReportRAG interactive chat
//!
//! Conversation memory on top of the document query pipeline, plus the
//! command parsing and console prompts used by the `chat` binary.

pub mod commands;
pub mod console;
pub mod session;

pub use commands::Command;
pub use session::{ChatSession, QueryConfirmer, Turn};
