//! Client management
//!
//! Per-connection session state and the control-connection loop.

pub mod handler;
pub mod state;

pub use handler::handle_client;
pub use state::Session;
