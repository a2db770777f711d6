//! Flat-file user credentials.
//!
//! The dashboard is gated by a plain text file with one `username, password`
//! record per line. The file is re-read on every call so edits take effect
//! without restarting. Blank lines and lines without a comma are ignored.

use crate::error::LinkResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only view of a credential file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by the file at `path`. The file is not read until used.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when some record matches both `username` and `password` exactly.
    pub fn authenticate(&self, username: &str, password: &str) -> LinkResult<bool> {
        let contents = fs::read_to_string(&self.path)?;
        let matched = records(&contents).any(|(user, pass)| user == username && pass == password);
        debug!(username, matched, "Credential check");
        Ok(matched)
    }

    /// Usernames in file order.
    pub fn usernames(&self) -> LinkResult<Vec<String>> {
        let contents = fs::read_to_string(&self.path)?;
        Ok(records(&contents).map(|(user, _)| user.to_string()).collect())
    }
}

/// Splits each line on its first comma; both halves are trimmed.
fn records(contents: &str) -> impl Iterator<Item = (&str, &str)> {
    contents
        .lines()
        .filter_map(|line| line.split_once(','))
        .map(|(user, pass)| (user.trim(), pass.trim()))
        .filter(|(user, _)| !user.is_empty())
}
