//! Module `commands`
//!
//! Defines the FTP commands understood by the server and the parser that
//! turns a raw control line into one.

use std::fmt;

/// Represents an FTP command parsed from the client input.
///
/// Commands that take an argument carry the raw remainder of the line,
/// which may be empty or contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    USER(String),
    PASS(String),
    PWD,
    CWD(String),
    LIST,
    PASV,
    TYPE(String),
    SYST,
    NOOP,
    FEAT,
    OPTS(String),
    SIZE(String),
    MKD(String),  // also XMKD
    RMD(String),  // also XRMD
    DELE(String),
    STOR(String),
    RNFR(String),
    RNTO(String),
    QUIT,
    UNKNOWN(String), // Verb as received, upper-cased
}

impl Command {
    /// Whether the command is gated behind a successful login.
    pub fn requires_login(&self) -> bool {
        !matches!(
            self,
            Command::USER(_)
                | Command::PASS(_)
                | Command::SYST
                | Command::NOOP
                | Command::FEAT
                | Command::OPTS(_)
                | Command::QUIT
                | Command::UNKNOWN(_)
        )
    }
}

/// Log-friendly rendering; PASS arguments are masked.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::USER(arg) => write!(f, "USER {arg}"),
            Command::PASS(_) => write!(f, "PASS ****"),
            Command::PWD => write!(f, "PWD"),
            Command::CWD(arg) => write!(f, "CWD {arg}"),
            Command::LIST => write!(f, "LIST"),
            Command::PASV => write!(f, "PASV"),
            Command::TYPE(arg) => write!(f, "TYPE {arg}"),
            Command::SYST => write!(f, "SYST"),
            Command::NOOP => write!(f, "NOOP"),
            Command::FEAT => write!(f, "FEAT"),
            Command::OPTS(arg) => write!(f, "OPTS {arg}"),
            Command::SIZE(arg) => write!(f, "SIZE {arg}"),
            Command::MKD(arg) => write!(f, "MKD {arg}"),
            Command::RMD(arg) => write!(f, "RMD {arg}"),
            Command::DELE(arg) => write!(f, "DELE {arg}"),
            Command::STOR(arg) => write!(f, "STOR {arg}"),
            Command::RNFR(arg) => write!(f, "RNFR {arg}"),
            Command::RNTO(arg) => write!(f, "RNTO {arg}"),
            Command::QUIT => write!(f, "QUIT"),
            Command::UNKNOWN(verb) => write!(f, "{verb} (unknown)"),
        }
    }
}

/// Parses a raw control line into a [`Command`].
///
/// The verb is case-folded to upper case. Everything after the first run of
/// whitespace is the argument, so `STOR my file.txt` keeps its space.
pub fn parse_command(raw: &str) -> Command {
    let trimmed = raw.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_ascii_uppercase();
    let arg = parts.next().unwrap_or("").trim_start().to_string();

    match cmd.as_str() {
        "USER" => Command::USER(arg),
        "PASS" => Command::PASS(arg),
        "PWD" => Command::PWD,
        "CWD" => Command::CWD(arg),
        "LIST" => Command::LIST,
        "PASV" => Command::PASV,
        "TYPE" => Command::TYPE(arg),
        "SYST" => Command::SYST,
        "NOOP" => Command::NOOP,
        "FEAT" => Command::FEAT,
        "OPTS" => Command::OPTS(arg),
        "SIZE" => Command::SIZE(arg),
        "MKD" | "XMKD" => Command::MKD(arg),
        "RMD" | "XRMD" => Command::RMD(arg),
        "DELE" => Command::DELE(arg),
        "STOR" => Command::STOR(arg),
        "RNFR" => Command::RNFR(arg),
        "RNTO" => Command::RNTO(arg),
        "QUIT" => Command::QUIT,
        _ => Command::UNKNOWN(cmd),
    }
}
