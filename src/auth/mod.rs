//! Authentication
//!
//! Checks USER/PASS pairs against the single configured account.

pub mod validator;

pub use validator::validate_login;
