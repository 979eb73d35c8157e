//! Authentication validator
//!
//! A login succeeds only when PASS directly follows a USER whose name and
//! the PASS argument both match the configured account.

use crate::config::ServerConfig;
use crate::error::FtpError;

/// Validates a PASS argument against the username from the preceding USER.
pub fn validate_login(
    config: &ServerConfig,
    pending_user: Option<&str>,
    password: &str,
) -> Result<(), FtpError> {
    match pending_user {
        Some(username) if username == config.username && password == config.password => Ok(()),
        _ => Err(FtpError::LoginIncorrect),
    }
}
