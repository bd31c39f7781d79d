//! Archive manifest builder.
//!
//! Describes the contents of a compressed archive without a full extraction
//! pass. Member listing and member streaming go through [`ArchiveTool`];
//! [`SevenZip`] drives the `7z` command line tool.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::process::{Command, Stdio};

#[cfg(any(test, feature = "mockall"))]
use mockall::automock;

use super::entry::{EntryKind, Manifest, ManifestEntry};
use super::error::{ManifestError, ManifestResult};
use super::hash::{ContentHasher, HashAlgorithm};

/// One member as reported by an archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Name as stored in the archive.
    pub name: String,
    pub kind: EntryKind,
    /// Checksum stored in the archive metadata, verbatim. `Some("")` when
    /// the listing has an empty checksum field, `None` when it has none.
    pub stored_checksum: Option<String>,
}

impl ArchiveMember {
    pub fn file(name: impl Into<String>, stored_checksum: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            stored_checksum: stored_checksum.map(str::to_string),
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: EntryKind::Directory, stored_checksum: None }
    }
}

/// External archive tool capabilities needed to fingerprint an archive.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait ArchiveTool {
    /// List every member with its type and stored checksum.
    fn list(&self, archive: &Path) -> ManifestResult<Vec<ArchiveMember>>;

    /// Stream one member out of the archive and hash it.
    fn member_digest(
        &self,
        archive: &Path,
        member: &str,
        algorithm: HashAlgorithm,
    ) -> ManifestResult<String>;
}

/// The 7-Zip command line tool.
#[derive(Debug, Clone)]
pub struct SevenZip {
    executable: PathBuf,
}

impl SevenZip {
    pub const DEFAULT_EXECUTABLE: &'static str = "7z";

    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self { executable: executable.into() }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl Default for SevenZip {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXECUTABLE)
    }
}

impl ArchiveTool for SevenZip {
    fn list(&self, archive: &Path) -> ManifestResult<Vec<ArchiveMember>> {
        let output = Command::new(&self.executable)
            .args(["l", "-slt", "--"])
            .arg(archive)
            .output()
            .map_err(|e| {
                ManifestError::ExternalTool(format!(
                    "failed to execute {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ManifestError::ExternalTool(format!(
                "listing {} failed ({}): {}",
                archive.display(),
                output.status,
                stderr.trim()
            )));
        }

        parse_technical_listing(&String::from_utf8_lossy(&output.stdout))
    }

    fn member_digest(
        &self,
        archive: &Path,
        member: &str,
        algorithm: HashAlgorithm,
    ) -> ManifestResult<String> {
        let mut child = Command::new(&self.executable)
            .args(["e", "-so", "-spd", "--"])
            .arg(archive)
            .arg(member)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ManifestError::ExternalTool(format!(
                    "failed to execute {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ManifestError::ExternalTool("archive tool stdout was not captured".to_string())
        })?;
        let digest = ContentHasher::hash_reader(algorithm, stdout);
        let status = child.wait().map_err(|e| ManifestError::io(archive, e))?;

        if !status.success() {
            return Err(ManifestError::ExternalTool(format!(
                "extracting {} from {} failed ({})",
                member,
                archive.display(),
                status
            )));
        }

        digest.map_err(|e| ManifestError::io(archive, e))
    }
}

const LISTING_SEPARATOR: &str = "----------";

/// Parse the output of `7z l -slt`.
///
/// Members follow the `----------` separator as blocks of `Key = Value`
/// lines, each block starting with `Path`.
pub fn parse_technical_listing(output: &str) -> ManifestResult<Vec<ArchiveMember>> {
    let mut lines = output.lines();
    if !lines.by_ref().any(|line| line.trim() == LISTING_SEPARATOR) {
        return Err(ManifestError::ExternalTool(
            "unrecognized archive listing: no member section".to_string(),
        ));
    }

    let mut members = Vec::new();
    let mut current: Option<PendingMember> = None;

    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        if key == "Path" {
            if let Some(pending) = current.take() {
                members.push(pending.finish());
            }
            current = Some(PendingMember { name: value.to_string(), ..Default::default() });
            continue;
        }

        let Some(pending) = current.as_mut() else {
            continue;
        };
        match key {
            "Folder" => pending.folder = Some(value == "+"),
            "Attributes" => pending.attributes = value.to_string(),
            "CRC" => pending.crc = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(pending) = current.take() {
        members.push(pending.finish());
    }

    Ok(members)
}

#[derive(Default)]
struct PendingMember {
    name: String,
    folder: Option<bool>,
    attributes: String,
    crc: Option<String>,
}

impl PendingMember {
    fn finish(self) -> ArchiveMember {
        let is_dir = self.folder.unwrap_or_else(|| self.attributes.starts_with('D'));
        if is_dir {
            ArchiveMember::directory(self.name)
        } else {
            ArchiveMember { name: self.name, kind: EntryKind::File, stored_checksum: self.crc }
        }
    }
}

/// Normalize a stored member name to the `/`-separated manifest form.
pub fn normalize_member_name(name: &str) -> String {
    let name = if MAIN_SEPARATOR == '/' {
        name.to_string()
    } else {
        name.replace(MAIN_SEPARATOR, "/")
    };
    let name = name.trim_start_matches("./");
    name.trim_end_matches('/').to_string()
}

/// Builds manifests for archives.
pub struct ArchiveManifestBuilder<T: ArchiveTool> {
    tool: T,
    algorithm: HashAlgorithm,
}

impl<T: ArchiveTool> ArchiveManifestBuilder<T> {
    pub fn new(tool: T, algorithm: HashAlgorithm) -> Self {
        Self { tool, algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn build(&self, archive: &Path) -> ManifestResult<Manifest> {
        if !archive.is_file() {
            return Err(ManifestError::NotFound(archive.to_path_buf()));
        }

        let members = self.tool.list(archive)?;
        let mut entries = Vec::with_capacity(members.len());
        let mut streamed = 0usize;

        for member in members {
            let relative_path = normalize_member_name(&member.name);
            if relative_path.is_empty() {
                continue;
            }

            match member.kind {
                EntryKind::Directory => entries.push(ManifestEntry::directory(relative_path)),
                EntryKind::File => {
                    // Formats without a stored CRC (tar) list no checksum at all;
                    // those members are streamed like any other algorithm.
                    let stored =
                        member.stored_checksum.filter(|_| self.algorithm.is_stored_in_archives());
                    let raw = match stored {
                        Some(raw) => raw,
                        None => {
                            streamed += 1;
                            self.tool.member_digest(archive, &member.name, self.algorithm)?
                        }
                    };
                    let hash = self.algorithm.normalize_checksum(&raw);
                    entries.push(ManifestEntry::file(relative_path, hash));
                }
            }
        }

        let manifest = Manifest::from_entries(entries)?;

        tracing::debug!(
            archive = %archive.display(),
            algorithm = %self.algorithm,
            entries = manifest.len(),
            files = manifest.file_count(),
            members_streamed = streamed,
            "Built archive manifest"
        );

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;

    const LISTING: &str = "\
7-Zip [64] 16.02 : Copyright (c) 1999-2016 Igor Pavlov : 2016-05-21

Scanning the drive for archives:
1 file, 302 bytes (1 KiB)

Listing archive: backup.7z

--
Path = backup.7z
Type = 7z
Physical Size = 302
Headers Size = 190
Method = LZMA2:12
Solid = +
Blocks = 1

----------
Path = prefs
Size = 0
Packed Size = 0
Modified = 2020-10-29 18:24:10
Attributes = D_ drwxr-xr-x
CRC =
Encrypted = -
Method =
Block =

Path = prefs/a.txt
Size = 9
Packed Size = 112
Modified = 2020-10-29 18:24:10
Attributes = A_ -rw-r--r--
CRC = CBF43926
Encrypted = -
Method = LZMA2:12
Block = 0

Path = prefs/empty.txt
Size = 0
Packed Size = 0
Modified = 2020-10-29 18:24:10
Attributes = A_ -rw-r--r--
CRC =
Encrypted = -
Method =
Block =
";

    #[test]
    fn test_parse_technical_listing() {
        let members = parse_technical_listing(LISTING).unwrap();
        assert_eq!(
            members,
            vec![
                ArchiveMember::directory("prefs"),
                ArchiveMember::file("prefs/a.txt", Some("CBF43926")),
                ArchiveMember::file("prefs/empty.txt", Some("")),
            ]
        );
    }

    #[test]
    fn test_parse_listing_folder_flag_wins() {
        let listing = "----------\nPath = docs\nFolder = +\nCRC = \n\nPath = docs/x\nFolder = -\nAttributes = D\nCRC = 0000ABCD\n";
        let members = parse_technical_listing(listing).unwrap();
        assert_eq!(members[0].kind, EntryKind::Directory);
        assert_eq!(members[1].kind, EntryKind::File);
    }

    #[test]
    fn test_parse_listing_without_separator_fails() {
        let result = parse_technical_listing("ERROR: backup.7z\nCan not open the file as archive\n");
        assert!(matches!(result, Err(ManifestError::ExternalTool(_))));
    }

    #[test]
    fn test_parse_listing_with_no_members() {
        let members = parse_technical_listing("Listing archive: x.7z\n----------\n").unwrap();
        assert!(members.is_empty());
    }

    #[test]
    fn test_normalize_member_name() {
        assert_eq!(normalize_member_name("./prefs/a.txt"), "prefs/a.txt");
        assert_eq!(normalize_member_name("prefs/sub/"), "prefs/sub");
        assert_eq!(normalize_member_name("prefs"), "prefs");
    }

    #[test]
    fn test_build_missing_archive_is_not_found() {
        let tool = MockArchiveTool::new();
        let builder = ArchiveManifestBuilder::new(tool, HashAlgorithm::Crc32);
        let result = builder.build(Path::new("/nonexistent/backup.7z"));
        assert!(matches!(result, Err(ManifestError::NotFound(_))));
    }

    #[test]
    fn test_build_uses_stored_crc_and_maps_empty_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup.7z");
        std::fs::write(&archive, b"stub").unwrap();

        let mut tool = MockArchiveTool::new();
        tool.expect_list().times(1).returning(|_| {
            Ok(vec![
                ArchiveMember::file("prefs/b.txt", Some("cbf43926")),
                ArchiveMember::directory("prefs/"),
                ArchiveMember::file("prefs/empty.txt", Some("")),
            ])
        });
        tool.expect_member_digest().never();

        let manifest = ArchiveManifestBuilder::new(tool, HashAlgorithm::Crc32).build(&archive).unwrap();

        assert_eq!(
            manifest.entries(),
            &[
                ManifestEntry::directory("prefs"),
                ManifestEntry::file("prefs/b.txt", Some("CBF43926".to_string())),
                ManifestEntry::file("prefs/empty.txt", None),
            ]
        );
    }

    #[test]
    fn test_build_streams_members_for_unstored_algorithms() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup.tar");
        std::fs::write(&archive, b"stub").unwrap();

        let mut tool = MockArchiveTool::new();
        tool.expect_list().returning(|_| {
            Ok(vec![ArchiveMember::directory("prefs"), ArchiveMember::file("prefs/a.txt", None)])
        });
        tool.expect_member_digest()
            .with(always(), eq("prefs/a.txt"), eq(HashAlgorithm::Sha256))
            .times(1)
            .returning(|_, _, _| Ok("ABCDEF".to_string()));

        let manifest =
            ArchiveManifestBuilder::new(tool, HashAlgorithm::Sha256).build(&archive).unwrap();

        assert_eq!(manifest.get("prefs/a.txt").unwrap().content_hash(), Some("abcdef"));
    }

    const TAR_LISTING: &str = "\
Listing archive: backup.tar

--
Path = backup.tar
Type = tar
Physical Size = 10240
Headers Size = 1536
Code Page = UTF-8

----------
Path = prefs
Folder = +
Size = 0
Packed Size = 0
Modified = 2020-10-29 18:24:10
Mode = drwxr-xr-x
User = user
Group = user

Path = prefs/a.txt
Folder = -
Size = 9
Packed Size = 512
Modified = 2020-10-29 18:24:10
Mode = -rw-r--r--
User = user
Group = user
";

    #[test]
    fn test_build_streams_crc_for_formats_without_stored_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup.tar");
        std::fs::write(&archive, b"stub").unwrap();

        let mut tool = MockArchiveTool::new();
        tool.expect_list().returning(|_| parse_technical_listing(TAR_LISTING));
        tool.expect_member_digest()
            .with(always(), eq("prefs/a.txt"), eq(HashAlgorithm::Crc32))
            .times(1)
            .returning(|_, _, algorithm| Ok(ContentHasher::hash_bytes(algorithm, b"123456789")));

        let manifest = ArchiveManifestBuilder::new(tool, HashAlgorithm::Crc32).build(&archive).unwrap();

        assert_eq!(
            manifest.entries(),
            &[
                ManifestEntry::directory("prefs"),
                ManifestEntry::file("prefs/a.txt", Some("CBF43926".to_string())),
            ]
        );
    }

    #[test]
    fn test_build_propagates_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.7z");
        std::fs::write(&archive, b"not an archive").unwrap();

        let mut tool = MockArchiveTool::new();
        tool.expect_list()
            .returning(|_| Err(ManifestError::ExternalTool("cannot open file as archive".into())));

        let result = ArchiveManifestBuilder::new(tool, HashAlgorithm::Crc32).build(&archive);
        assert!(matches!(result, Err(ManifestError::ExternalTool(_))));
    }

    #[test]
    fn test_build_rejects_duplicate_members() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("appended.tar");
        std::fs::write(&archive, b"stub").unwrap();

        let mut tool = MockArchiveTool::new();
        tool.expect_list().returning(|_| {
            Ok(vec![ArchiveMember::file("a.txt", Some("1")), ArchiveMember::file("./a.txt", Some("2"))])
        });

        let result = ArchiveManifestBuilder::new(tool, HashAlgorithm::Crc32).build(&archive);
        assert!(matches!(result, Err(ManifestError::DuplicatePath(_))));
    }

    #[test]
    fn test_seven_zip_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("backup.7z");
        std::fs::write(&archive, b"stub").unwrap();

        let tool = SevenZip::new(dir.path().join("no-such-7z"));
        let result = tool.list(&archive);
        assert!(matches!(result, Err(ManifestError::ExternalTool(_))));
    }
}
