//! Module `state`
//!
//! Per-connection session state: authentication, working directory,
//! pending rename source and the passive listener.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::transfer::PassiveListener;

/// Represents the state of a connected FTP client.
///
/// Owned by the session task; commands run sequentially so no locking is
/// needed.
#[derive(Debug)]
pub struct Session {
    client_addr: SocketAddr,
    authenticated: bool,
    pending_user: Option<String>,
    cwd: PathBuf,
    passive: Option<PassiveListener>,
    pending_rename: Option<PathBuf>,
}

impl Session {
    /// New unauthenticated session positioned at the sandbox root.
    pub fn new(client_addr: SocketAddr, root: &Path) -> Self {
        Self {
            client_addr,
            authenticated: false,
            pending_user: None,
            cwd: root.to_path_buf(),
            passive: None,
            pending_rename: None,
        }
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    /// Remembers the USER argument for the next command only.
    pub fn set_pending_user(&mut self, username: String) {
        self.pending_user = Some(username);
    }

    /// Takes the username stored by the immediately preceding USER.
    pub fn take_pending_user(&mut self) -> Option<String> {
        self.pending_user.take()
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Callers must pass a canonical, root-contained directory.
    pub fn set_cwd(&mut self, cwd: PathBuf) {
        self.cwd = cwd;
    }

    pub fn has_passive(&self) -> bool {
        self.passive.is_some()
    }

    /// Replaces the passive listener; the previous one is closed on drop.
    pub fn set_passive(&mut self, passive: Option<PassiveListener>) {
        self.passive = passive;
    }

    pub fn take_passive(&mut self) -> Option<PassiveListener> {
        self.passive.take()
    }

    pub fn set_pending_rename(&mut self, source: Option<PathBuf>) {
        self.pending_rename = source;
    }

    pub fn take_pending_rename(&mut self) -> Option<PathBuf> {
        self.pending_rename.take()
    }

    pub fn has_pending_rename(&self) -> bool {
        self.pending_rename.is_some()
    }
}
