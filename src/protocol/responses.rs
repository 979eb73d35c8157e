//! FTP Response handling
//!
//! Defines FTP response codes and the wire format of single- and multi-line
//! replies.

use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Standard FTP response codes
pub const OPENING_DATA_CONNECTION: u16 = 150;
pub const OK: u16 = 200;
pub const SYSTEM_STATUS: u16 = 211;
pub const FILE_STATUS: u16 = 213;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const CLOSING: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const PASSIVE_MODE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const PENDING_FURTHER_INFO: u16 = 350;
pub const SERVICE_NOT_AVAILABLE: u16 = 421;
pub const CANT_OPEN_DATA_CONNECTION: u16 = 425;
pub const SYNTAX_ERROR: u16 = 500;
pub const SYNTAX_ERROR_IN_ARGS: u16 = 501;
pub const NOT_IMPLEMENTED: u16 = 502;
pub const BAD_SEQUENCE: u16 = 503;
pub const NOT_LOGGED_IN: u16 = 530;
pub const FILE_UNAVAILABLE: u16 = 550;

pub const CRLF: &str = "\r\n";

/// A reply to send on the control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Single {
        code: u16,
        message: String,
    },
    /// `<code>-<header>`, one line per body entry, then `<code> End`
    Multi {
        code: u16,
        header: String,
        lines: Vec<String>,
    },
}

impl Reply {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Reply::Single {
            code,
            message: message.into(),
        }
    }

    pub fn multi(code: u16, header: impl Into<String>, lines: Vec<String>) -> Self {
        Reply::Multi {
            code,
            header: header.into(),
            lines,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Reply::Single { code, .. } | Reply::Multi { code, .. } => *code,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Single { code, message } => write!(f, "{code} {message}{CRLF}"),
            Reply::Multi {
                code,
                header,
                lines,
            } => {
                write!(f, "{code}-{header}{CRLF}")?;
                for line in lines {
                    write!(f, "{line}{CRLF}")?;
                }
                write!(f, "{code} End{CRLF}")
            }
        }
    }
}

/// Writes `reply` to the control connection and flushes it.
pub async fn send_reply<W>(writer: &mut W, reply: &Reply) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.to_string().as_bytes()).await?;
    writer.flush().await
}
