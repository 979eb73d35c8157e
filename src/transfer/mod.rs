//! Transfer module for FTP server
//!
//! Handles the passive data channel and the byte streaming for LIST and
//! STOR.

pub mod data_channel;
pub mod file_ops;

pub use data_channel::{PassiveListener, passive_ip};
pub use file_ops::{receive_file, send_listing};
