//! Navigate module
//!
//! Handles directory navigation operations for FTP clients,
//! including changing directories and reporting the current path.

mod operations;

pub use operations::{change_directory, working_directory};
