//! Equivalence checks between a live source and an existing archive.

use std::path::Path;

use super::archive::{ArchiveManifestBuilder, ArchiveTool, SevenZip};
use super::diff::{self, DifferenceReport};
use super::error::ManifestResult;
use super::hash::HashAlgorithm;
use super::path::PathManifestBuilder;

/// Outcome of comparing a source path against an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Equivalence {
    /// The archive already matches the source.
    Equivalent,
    /// The archive differs from the source.
    Different(DifferenceReport),
}

impl Equivalence {
    pub fn is_equivalent(&self) -> bool {
        matches!(self, Equivalence::Equivalent)
    }

    pub fn report(&self) -> Option<&DifferenceReport> {
        match self {
            Equivalence::Equivalent => None,
            Equivalence::Different(report) => Some(report),
        }
    }
}

/// Runs path and archive manifest builders and compares their output.
pub struct EquivalenceChecker<T: ArchiveTool> {
    path_builder: PathManifestBuilder,
    archive_builder: ArchiveManifestBuilder<T>,
}

impl EquivalenceChecker<SevenZip> {
    /// Checker backed by the 7z executable at `seven_zip`.
    pub fn seven_zip(seven_zip: impl Into<std::path::PathBuf>, algorithm: HashAlgorithm) -> Self {
        Self::new(SevenZip::new(seven_zip), algorithm)
    }
}

impl<T: ArchiveTool> EquivalenceChecker<T> {
    pub fn new(tool: T, algorithm: HashAlgorithm) -> Self {
        Self {
            path_builder: PathManifestBuilder::new(algorithm),
            archive_builder: ArchiveManifestBuilder::new(tool, algorithm),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.path_builder.algorithm()
    }

    /// Compare `source` against `archive`.
    pub fn check(&self, source: &Path, archive: &Path) -> ManifestResult<Equivalence> {
        let source_manifest = self.path_builder.build(source)?;
        let archive_manifest = self.archive_builder.build(archive)?;

        if diff::equivalent(&archive_manifest, &source_manifest) {
            tracing::info!(
                source = %source.display(),
                archive = %archive.display(),
                entries = source_manifest.len(),
                "Archive matches source"
            );
            return Ok(Equivalence::Equivalent);
        }

        let report = diff::diff(&archive_manifest, &source_manifest);
        tracing::info!(
            source = %source.display(),
            archive = %archive.display(),
            archive_only = report.archive_only.len(),
            source_only = report.path_only.len(),
            changed = report.both_with_hash_diff.len(),
            "Archive differs from source"
        );

        Ok(Equivalence::Different(report))
    }

    /// Whether `archive` is an accurate backup of `source`.
    ///
    /// Errors count as "not current": an archive that cannot be verified
    /// never suppresses a new backup.
    pub fn archive_is_current(&self, source: &Path, archive: &Path) -> bool {
        match self.check(source, archive) {
            Ok(Equivalence::Equivalent) => true,
            Ok(Equivalence::Different(report)) => {
                tracing::debug!("Differences for {}:\n{}", archive.display(), report);
                false
            }
            Err(e) => {
                tracing::warn!(
                    source = %source.display(),
                    archive = %archive.display(),
                    error = %e,
                    "Cannot determine archive equivalence, a new archive is needed"
                );
                false
            }
        }
    }
}
