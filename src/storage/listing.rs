//! Directory listing formatter
//!
//! Renders a Unix `ls -l` style block for LIST.

use chrono::{DateTime, Local};
use log::debug;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::config::ListingTimestamps;
use crate::error::StorageError;

/// Date column used unless real timestamps are configured.
pub const PLACEHOLDER_DATE: &str = "Jan 01 12:00";

const DIRECTORY_PERMISSIONS: &str = "drwxr-xr-x";
const FILE_PERMISSIONS: &str = "-rw-r--r--";
const DIRECTORY_SIZE: &str = "4096";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub date: String,
}

impl ListingEntry {
    pub fn format(&self) -> String {
        if self.is_dir {
            format!(
                "{DIRECTORY_PERMISSIONS} 1 owner group {DIRECTORY_SIZE} {} {}",
                self.date, self.name
            )
        } else {
            format!(
                "{FILE_PERMISSIONS} 1 owner group {:>8} {} {}",
                self.size, self.date, self.name
            )
        }
    }
}

/// Directories first, then files, case-insensitive by name within each group.
fn listing_order(a: &ListingEntry, b: &ListingEntry) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// Reads `dir` and returns one formatted line per entry, without terminators.
pub fn list_directory(
    dir: &Path,
    timestamps: ListingTimestamps,
) -> Result<Vec<String>, StorageError> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // Follows symlinks so a link to a directory lists as one
        let metadata = match fs::metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping unreadable entry {:?}: {}", entry.file_name(), e);
                continue;
            }
        };

        let date = match timestamps {
            ListingTimestamps::Placeholder => PLACEHOLDER_DATE.to_string(),
            ListingTimestamps::Modified => metadata
                .modified()
                .map(|time| DateTime::<Local>::from(time).format("%b %d %H:%M").to_string())
                .unwrap_or_else(|_| PLACEHOLDER_DATE.to_string()),
        };

        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            date,
        });
    }

    entries.sort_by(listing_order);
    debug!("Listed {} ({} entries)", dir.display(), entries.len());

    Ok(entries.iter().map(ListingEntry::format).collect())
}
