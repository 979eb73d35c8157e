//! Error handling
//!
//! Defines error types for the server lifecycle, the storage sandbox, the
//! data channel, and the reply-level taxonomy sent back to clients.

pub mod types;

pub use types::*;
