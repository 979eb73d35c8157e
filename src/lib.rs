//! Embeddable FTP server.
//!
//! A host builds a [`Server`] from a port, a single account and a root
//! directory, then drives it with `start`/`stop`. Clients are confined to
//! the root directory and transfer data over passive-mode connections.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod navigate;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;

pub use config::{ListingTimestamps, ServerConfig};
pub use error::ServerError;
pub use server::Server;
