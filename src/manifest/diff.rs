//! Manifest differencer.
//!
//! Compares an archive-derived manifest against a path-derived one and sorts
//! every discrepancy into exactly one of three buckets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use super::entry::{Manifest, ManifestEntry};

/// A path present on both sides with a differing kind or hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedEntry {
    pub archive: ManifestEntry,
    pub source: ManifestEntry,
}

impl ChangedEntry {
    pub fn relative_path(&self) -> &str {
        self.archive.relative_path()
    }

    /// The conflicting entries, archive side first.
    pub fn entries(&self) -> [&ManifestEntry; 2] {
        [&self.archive, &self.source]
    }
}

/// Classified differences between two manifests.
///
/// The three lists are disjoint by relative path and sorted by it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DifferenceReport {
    pub archive_only: Vec<ManifestEntry>,
    pub path_only: Vec<ManifestEntry>,
    pub both_with_hash_diff: Vec<ChangedEntry>,
}

impl DifferenceReport {
    pub fn is_empty(&self) -> bool {
        self.archive_only.is_empty() && self.path_only.is_empty() && self.both_with_hash_diff.is_empty()
    }

    /// Total number of differing paths.
    pub fn len(&self) -> usize {
        self.archive_only.len() + self.path_only.len() + self.both_with_hash_diff.len()
    }

    /// Every differing relative path, across all categories.
    pub fn paths(&self) -> BTreeSet<&str> {
        self.archive_only
            .iter()
            .chain(self.path_only.iter())
            .map(ManifestEntry::relative_path)
            .chain(self.both_with_hash_diff.iter().map(ChangedEntry::relative_path))
            .collect()
    }
}

/// Two manifests are equivalent iff their normalized entry sequences match.
pub fn equivalent(a: &Manifest, b: &Manifest) -> bool {
    a == b
}

/// Classify the differences between an archive manifest and a path manifest.
pub fn diff(archive: &Manifest, source: &Manifest) -> DifferenceReport {
    if equivalent(archive, source) {
        return DifferenceReport::default();
    }

    let archive_set = archive.entry_set();
    let source_set = source.entry_set();

    let archive_candidates: Vec<&ManifestEntry> =
        archive.iter().filter(|e| !source_set.contains(e)).collect();
    let source_candidates: Vec<&ManifestEntry> =
        source.iter().filter(|e| !archive_set.contains(e)).collect();

    // A path that is a candidate on both sides changed rather than moved in or out.
    let mut occurrences: BTreeMap<&str, usize> = BTreeMap::new();
    for &entry in archive_candidates.iter().chain(source_candidates.iter()) {
        *occurrences.entry(entry.relative_path()).or_default() += 1;
    }
    let changed_paths: BTreeSet<&str> =
        occurrences.into_iter().filter(|(_, count)| *count > 1).map(|(path, _)| path).collect();

    let mut both_with_hash_diff = Vec::with_capacity(changed_paths.len());
    for path in &changed_paths {
        if let (Some(a), Some(s)) = (archive.get(path), source.get(path)) {
            both_with_hash_diff.push(ChangedEntry { archive: a.clone(), source: s.clone() });
        }
    }

    let exclusive = |candidates: Vec<&ManifestEntry>| -> Vec<ManifestEntry> {
        candidates
            .into_iter()
            .filter(|e| !changed_paths.contains(e.relative_path()))
            .cloned()
            .collect()
    };

    DifferenceReport {
        archive_only: exclusive(archive_candidates),
        path_only: exclusive(source_candidates),
        both_with_hash_diff,
    }
}

fn write_entry_line(f: &mut fmt::Formatter<'_>, label: &str, entry: &ManifestEntry) -> fmt::Result {
    writeln!(
        f,
        "    {:<8} [{}] {}",
        label,
        entry.kind(),
        entry.content_hash().unwrap_or("-")
    )
}

impl fmt::Display for DifferenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Only in archive ({}):", self.archive_only.len())?;
        for entry in &self.archive_only {
            writeln!(f, "  {}", entry)?;
        }

        writeln!(f, "Only in source ({}):", self.path_only.len())?;
        for entry in &self.path_only {
            writeln!(f, "  {}", entry)?;
        }

        writeln!(f, "Changed ({}):", self.both_with_hash_diff.len())?;
        for changed in &self.both_with_hash_diff {
            writeln!(f, "  {}", changed.relative_path())?;
            write_entry_line(f, "archive:", &changed.archive)?;
            write_entry_line(f, "source:", &changed.source)?;
        }

        Ok(())
    }
}
