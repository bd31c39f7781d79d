//! `SevenZip` against a shell script that mimics the 7z command line.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use prefbak::manifest::{
    ArchiveManifestBuilder, ArchiveTool, ContentHasher, EntryKind, HashAlgorithm, ManifestError,
    SevenZip,
};
use serial_test::serial;
use tempfile::TempDir;

// `l -slt -- <archive>` prints a listing, `e -so -spd -- <archive> <member>`
// prints the member. Archives named `broken*` fail like an unreadable archive.
const FAKE_7Z: &str = r#"#!/bin/sh
case "$1" in
  l) archive="$4" ;;
  e) archive="$5"; member="$6" ;;
  *) exit 7 ;;
esac
case "$archive" in
  *broken*)
    echo "ERROR: $archive: Can not open the file as archive" >&2
    exit 2 ;;
esac
case "$1" in
  l)
    printf '%s\n' "Listing archive: $archive" "" "----------" \
      "Path = prefs" "Folder = +" "" \
      "Path = prefs/a.txt" "Folder = -" "Size = 9" "" ;;
  e)
    [ "$2" = "-so" ] && [ "$3" = "-spd" ] || exit 7
    case "$member" in
      prefs/a.txt) printf '123456789' ;;
      *) echo "No files to process" >&2; exit 2 ;;
    esac ;;
esac
"#;

struct Fixture {
    dir: TempDir,
    tool: SevenZip,
}

fn setup() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let executable = dir.path().join("7z");
    fs::write(&executable, FAKE_7Z).unwrap();
    fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();
    Fixture { tool: SevenZip::new(executable), dir }
}

fn archive(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"archive").unwrap();
    path
}

#[test]
#[serial]
fn test_list_parses_tool_output() {
    let fx = setup();
    let members = fx.tool.list(&archive(fx.dir.path(), "prefs.tar")).unwrap();

    assert_eq!(members.len(), 2);
    assert_eq!(members[0].kind, EntryKind::Directory);
    assert_eq!(members[1].name, "prefs/a.txt");
    assert_eq!(members[1].stored_checksum, None);
}

#[test]
#[serial]
fn test_list_non_zero_exit_is_external_tool_error() {
    let fx = setup();
    let err = fx.tool.list(&archive(fx.dir.path(), "broken.7z")).unwrap_err();

    assert!(err.is_external_tool());
    assert!(err.to_string().contains("Can not open the file as archive"));
}

#[test]
#[serial]
fn test_member_digest_streams_member() {
    let fx = setup();
    let tar = archive(fx.dir.path(), "prefs.tar");

    let crc = fx.tool.member_digest(&tar, "prefs/a.txt", HashAlgorithm::Crc32).unwrap();
    assert_eq!(crc, "CBF43926");

    let sha = fx.tool.member_digest(&tar, "prefs/a.txt", HashAlgorithm::Sha256).unwrap();
    assert_eq!(sha, ContentHasher::hash_bytes(HashAlgorithm::Sha256, b"123456789"));
}

#[test]
#[serial]
fn test_member_digest_non_zero_exit_is_external_tool_error() {
    let fx = setup();
    let tar = archive(fx.dir.path(), "prefs.tar");

    let result = fx.tool.member_digest(&tar, "prefs/missing.txt", HashAlgorithm::Crc32);
    assert!(matches!(result, Err(ManifestError::ExternalTool(_))));
}

#[test]
#[serial]
fn test_archive_manifest_through_real_process() {
    let fx = setup();
    let tar = archive(fx.dir.path(), "prefs.tar");

    let manifest = ArchiveManifestBuilder::new(fx.tool.clone(), HashAlgorithm::Crc32).build(&tar).unwrap();

    assert_eq!(manifest.len(), 2);
    assert_eq!(manifest.get("prefs/a.txt").unwrap().content_hash(), Some("CBF43926"));
}
