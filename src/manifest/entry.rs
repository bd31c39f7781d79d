//! Manifest entry model.
//!
//! A manifest is the structural fingerprint of one subtree: every file and
//! directory with its relative path and, for files, a content hash.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{ManifestError, ManifestResult};

/// Kind of filesystem object a manifest entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "dir"),
        }
    }
}

/// One row of a manifest.
///
/// Equality is structural over all three fields, so an absent hash only
/// equals another absent hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    relative_path: String,
    kind: EntryKind,
    content_hash: Option<String>,
}

impl ManifestEntry {
    pub fn file(relative_path: impl Into<String>, content_hash: Option<String>) -> Self {
        Self { relative_path: relative_path.into(), kind: EntryKind::File, content_hash }
    }

    pub fn directory(relative_path: impl Into<String>) -> Self {
        Self { relative_path: relative_path.into(), kind: EntryKind::Directory, content_hash: None }
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (hash: {})",
            self.kind,
            self.relative_path,
            self.content_hash.as_deref().unwrap_or("-")
        )
    }
}

/// A normalized manifest: entries sorted by relative path, paths unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build a manifest from entries in any order.
    ///
    /// Sorting is byte-wise on the relative path. Fails if two entries share
    /// a relative path.
    pub fn from_entries(mut entries: Vec<ManifestEntry>) -> ManifestResult<Self> {
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        if let Some(pair) = entries.windows(2).find(|w| w[0].relative_path == w[1].relative_path)
        {
            return Err(ManifestError::DuplicatePath(pair[0].relative_path.clone()));
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, relative_path: &str) -> Option<&ManifestEntry> {
        self.entries
            .binary_search_by(|e| e.relative_path.as_str().cmp(relative_path))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub(crate) fn entry_set(&self) -> HashSet<&ManifestEntry> {
        self.entries.iter().collect()
    }

    /// Number of file entries.
    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|e| e.kind == EntryKind::File).count()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
