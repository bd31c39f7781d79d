//! Path manifest builder.
//!
//! Walks a live filesystem subtree and fingerprints it. Relative paths keep
//! the root's own basename as their first component, which is how archive
//! tools name members when a folder is compressed.

use std::path::{Component, Path};

use walkdir::WalkDir;

use super::entry::{Manifest, ManifestEntry};
use super::error::{ManifestError, ManifestResult};
use super::hash::{ContentHasher, HashAlgorithm};

/// Builds manifests for live paths.
#[derive(Debug, Clone)]
pub struct PathManifestBuilder {
    algorithm: HashAlgorithm,
}

impl PathManifestBuilder {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Build the manifest for `root` (a file or a directory).
    pub fn build(&self, root: &Path) -> ManifestResult<Manifest> {
        if !root.exists() {
            return Err(ManifestError::NotFound(root.to_path_buf()));
        }

        // `/` and `..` have no basename to anchor relative paths on.
        if root.file_name().is_none() {
            return Err(ManifestError::InvalidRoot(root.to_path_buf()));
        }
        let base = root.parent().ok_or_else(|| ManifestError::InvalidRoot(root.to_path_buf()))?;

        let mut entries = Vec::new();
        let mut total_bytes: u64 = 0;
        let mut skipped = 0usize;

        for item in WalkDir::new(root).follow_links(true) {
            let item = item.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
                ManifestError::io(path, source)
            })?;

            let path = item.path();
            let relative_path = relative_manifest_path(base, path)?;

            let file_type = item.file_type();
            if file_type.is_dir() {
                entries.push(ManifestEntry::directory(relative_path));
            } else if file_type.is_file() {
                let hash = ContentHasher::hash_file(self.algorithm, path)
                    .map_err(|e| ManifestError::io(path, e))?;
                total_bytes += item.metadata().map(|m| m.len()).unwrap_or(0);
                entries.push(ManifestEntry::file(relative_path, Some(hash)));
            } else {
                // FIFOs, sockets and device nodes have no content to hash;
                // opening a FIFO would block until a writer shows up.
                skipped += 1;
                tracing::warn!(path = %path.display(), "Skipping special file");
            }
        }

        let manifest = Manifest::from_entries(entries)?;

        tracing::debug!(
            root = %root.display(),
            algorithm = %self.algorithm,
            entries = manifest.len(),
            files = manifest.file_count(),
            bytes_hashed = total_bytes,
            special_files_skipped = skipped,
            "Built path manifest"
        );

        Ok(manifest)
    }
}

/// Relative path of `path` under `base`, components joined with `/`.
fn relative_manifest_path(base: &Path, path: &Path) -> ManifestResult<String> {
    let relative =
        path.strip_prefix(base).map_err(|_| ManifestError::InvalidRoot(path.to_path_buf()))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(ManifestError::InvalidRoot(path.to_path_buf())),
        }
    }

    if parts.is_empty() {
        return Err(ManifestError::InvalidRoot(path.to_path_buf()));
    }

    Ok(parts.join("/"))
}
