//! File system storage management
//!
//! Handles the path sandbox, directory listings and filesystem operations.

pub mod listing;
pub mod operations;
pub mod sandbox;

pub use listing::list_directory;
pub use sandbox::Sandbox;
