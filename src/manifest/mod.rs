//! Manifest diff engine.
//!
//! Decides whether an existing backup archive already represents a live
//! source path:
//! - content hashing behind one algorithm switch
//! - path manifests from a filesystem walk
//! - archive manifests from the archive tool's listing
//! - three-way differencing and the equivalence check built on it

mod archive;
mod diff;
mod entry;
mod equivalence;
mod error;
mod hash;
mod path;

#[cfg(any(test, feature = "mockall"))]
pub use archive::MockArchiveTool;
pub use archive::{
    ArchiveManifestBuilder, ArchiveMember, ArchiveTool, SevenZip, normalize_member_name,
    parse_technical_listing,
};
pub use diff::{ChangedEntry, DifferenceReport, diff, equivalent};
pub use entry::{EntryKind, Manifest, ManifestEntry};
pub use equivalence::{Equivalence, EquivalenceChecker};
pub use error::{ManifestError, ManifestResult};
pub use hash::{ContentHasher, HashAlgorithm};
pub use path::PathManifestBuilder;
