//! Error types
//!
//! Domain errors for each layer of the FTP server, plus [`FtpError`], the
//! taxonomy that maps onto 3-digit reply codes.

use std::io;
use thiserror::Error;

use crate::protocol::responses::{self, Reply};

/// Errors surfaced to the host by `Server::start` and configuration loading.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind control socket {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("root directory {path} is not usable: {source}")]
    RootDirectory {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Storage and sandbox errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("path escapes the sandbox root")]
    OutsideRoot,

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("directory not empty")]
    NotEmpty,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Data channel errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("control connection has no local IPv4 address")]
    NoIpv4Address,

    #[error("failed to open passive listener: {0}")]
    ListenerSetup(#[source] io::Error),

    #[error("timed out waiting for data connection")]
    AcceptTimeout,

    #[error("failed to accept data connection: {0}")]
    Accept(#[source] io::Error),

    #[error("transfer failed: {0}")]
    Stream(#[source] io::Error),
}

/// Reply-level failure of a single command.
///
/// Handlers return these; the dispatcher turns them into a reply and keeps
/// the session alive, except for [`FtpError::ControlClosed`].
#[derive(Debug, Error)]
pub enum FtpError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Login incorrect")]
    LoginIncorrect,

    #[error("Access denied")]
    AccessDenied,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    AlreadyExists(&'static str),

    /// Target exists but has the wrong shape for the command
    #[error("{0}")]
    InvalidTarget(&'static str),

    #[error("{0}")]
    OperationFailed(&'static str),

    #[error("Bad sequence of commands (use RNFR first)")]
    BadSequence,

    #[error("{0}")]
    Transfer(&'static str),

    #[error("{0}")]
    DataConnection(&'static str),

    #[error("Command not implemented")]
    UnsupportedCommand,

    #[error("Option not supported")]
    UnsupportedOption,

    /// Writing to the control connection failed; ends the session.
    #[error("control connection failed: {0}")]
    ControlClosed(#[source] io::Error),
}

impl FtpError {
    pub fn reply_code(&self) -> u16 {
        match self {
            FtpError::NotLoggedIn | FtpError::LoginIncorrect => responses::NOT_LOGGED_IN,
            FtpError::AccessDenied
            | FtpError::NotFound(_)
            | FtpError::AlreadyExists(_)
            | FtpError::InvalidTarget(_)
            | FtpError::OperationFailed(_)
            | FtpError::Transfer(_) => responses::FILE_UNAVAILABLE,
            FtpError::BadSequence => responses::BAD_SEQUENCE,
            FtpError::DataConnection(_) => responses::CANT_OPEN_DATA_CONNECTION,
            FtpError::UnsupportedCommand => responses::NOT_IMPLEMENTED,
            FtpError::UnsupportedOption => responses::SYNTAX_ERROR_IN_ARGS,
            FtpError::ControlClosed(_) => responses::SERVICE_NOT_AVAILABLE,
        }
    }

    pub fn to_reply(&self) -> Reply {
        Reply::new(self.reply_code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_reply_codes() {
        assert_eq!(FtpError::NotLoggedIn.reply_code(), 530);
        assert_eq!(FtpError::AccessDenied.reply_code(), 550);
        assert_eq!(FtpError::BadSequence.reply_code(), 503);
        assert_eq!(FtpError::UnsupportedCommand.reply_code(), 502);
        assert_eq!(FtpError::UnsupportedOption.reply_code(), 501);
        assert_eq!(FtpError::DataConnection("Use PASV first").reply_code(), 425);
        assert_eq!(FtpError::Transfer("Transfer failed").reply_code(), 550);
    }

    #[test]
    fn sandbox_violation_never_discloses_paths() {
        let reply = FtpError::AccessDenied.to_reply();
        assert_eq!(reply.to_string(), "550 Access denied\r\n");
    }
}
