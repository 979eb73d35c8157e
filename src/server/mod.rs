//! Server core functionality
//!
//! Control-socket lifecycle and the registry of running sessions.

pub mod core;
pub mod registry;

pub use self::core::Server;
pub use registry::SessionRegistry;
