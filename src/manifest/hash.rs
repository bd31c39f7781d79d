//! Content hashing.
//!
//! All manifest builders hash through [`ContentHasher`] so that both sides of
//! a comparison use the same algorithm and the same rendering.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Process-wide content hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// CRC32, rendered as 8 uppercase hex digits. Stored by 7z and zip archives.
    #[default]
    Crc32,
    /// SHA-256, rendered as lowercase hex.
    Sha256,
    /// BLAKE3, rendered as lowercase hex.
    Blake3,
}

impl HashAlgorithm {
    /// Whether archive formats store this checksum per member, so it can be
    /// read from the listing without extracting anything.
    pub fn is_stored_in_archives(&self) -> bool {
        matches!(self, HashAlgorithm::Crc32)
    }

    /// Normalize a checksum reported by an external tool.
    ///
    /// Empty or whitespace-only values become `None`.
    pub fn normalize_checksum(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(match self {
            HashAlgorithm::Crc32 => trimmed.to_ascii_uppercase(),
            HashAlgorithm::Sha256 | HashAlgorithm::Blake3 => trimmed.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Crc32 => write!(f, "crc32"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Blake3 => write!(f, "blake3"),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crc32" | "crc" => Ok(HashAlgorithm::Crc32),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(format!("Invalid hash algorithm: {}", s)),
        }
    }
}

enum HasherState {
    Crc32(crc32fast::Hasher),
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

/// Incremental hasher for the configured algorithm.
pub struct ContentHasher {
    state: HasherState,
}

impl ContentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        let state = match algorithm {
            HashAlgorithm::Crc32 => HasherState::Crc32(crc32fast::Hasher::new()),
            HashAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => HasherState::Blake3(Box::new(blake3::Hasher::new())),
        };
        Self { state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HasherState::Crc32(h) => h.update(data),
            HasherState::Sha256(h) => h.update(data),
            HasherState::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize(self) -> String {
        match self.state {
            HasherState::Crc32(h) => format!("{:08X}", h.finalize()),
            HasherState::Sha256(h) => hex::encode(h.finalize()),
            HasherState::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }

    /// Hash everything a reader yields.
    pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, mut reader: R) -> io::Result<String> {
        let mut hasher = Self::new(algorithm);
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let count = reader.read(&mut buffer)?;
            if count == 0 {
                break;
            }
            hasher.update(&buffer[..count]);
        }

        Ok(hasher.finalize())
    }

    pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> io::Result<String> {
        let file = File::open(path)?;
        Self::hash_reader(algorithm, file)
    }

    pub fn hash_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
        let mut hasher = Self::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }
}
