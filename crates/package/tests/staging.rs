//! Extraction from zip packages, including failure and cancellation paths.

use std::io::{Cursor, Write};
use std::path::Path;

use surface_core::CancelToken;
use surface_package::{
    extract, list_variants, ExtractOptions, ExtractOutcome, Framework, MemoryPackage,
    NuspecManifest, PackageArchive, PackageError, ZipPackage,
};
use zip::write::SimpleFileOptions;

fn nupkg(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn options(root: &Path) -> ExtractOptions {
    ExtractOptions {
        include_docs: true,
        staging_root: Some(root.to_path_buf()),
    }
}

fn staged_dirs(root: &Path) -> usize {
    std::fs::read_dir(root).unwrap().count()
}

/// Fails when asked to copy one named entry.
struct FailingArchive {
    inner: MemoryPackage,
    fail_on: &'static str,
}

impl PackageArchive for FailingArchive {
    fn entries(&self) -> Vec<String> {
        self.inner.entries()
    }

    fn copy_entry(&mut self, name: &str, out: &mut dyn Write) -> Result<u64, PackageError> {
        if name == self.fail_on {
            // Leave a partial file behind before failing.
            out.write_all(b"MZ").unwrap();
            return Err(PackageError::Archive(format!("{}: corrupt deflate stream", name)));
        }
        self.inner.copy_entry(name, out)
    }
}

#[test]
fn zip_package_selects_cross_family_variant() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Acme.Widgets.2.1.0.nupkg");
    std::fs::write(
        &path,
        nupkg(&[
            ("Acme.Widgets.nuspec", b"<package><metadata><id>Acme.Widgets</id><version>2.1.0</version></metadata></package>"),
            ("lib/net4.8/Acme.Widgets.dll", b"net48"),
            ("lib/netstandard2.0/Acme.Widgets.dll", b"netstandard"),
            ("lib/netstandard2.0/Acme.Widgets.xml", b"<doc/>"),
        ]),
    )
    .unwrap();

    let mut package = ZipPackage::open(&path).unwrap();
    assert_eq!(package.source(), Some(path.as_path()));
    assert_eq!(
        list_variants(&package),
        vec![Framework::parse("net4.8"), Framework::parse("netstandard2.0")]
    );
    let manifest = NuspecManifest::from_archive(&mut package).unwrap().unwrap();
    assert_eq!(manifest.version, "2.1.0");

    let root = tempfile::tempdir().unwrap();
    let outcome = extract(&mut package, Some("net8.0"), &options(root.path()), &CancelToken::new())
        .unwrap();
    let ExtractOutcome::Extracted(extraction) = outcome else {
        panic!("expected an extraction");
    };
    assert_eq!(extraction.selection.target, "net8.0");
    assert_eq!(extraction.selection.selected.as_deref(), Some("netstandard2.0"));
    assert_eq!(std::fs::read(&extraction.binaries[0]).unwrap(), b"netstandard");
    assert_eq!(extraction.docs.len(), 1);
    assert_eq!(staged_dirs(root.path()), 1);

    drop(extraction);
    assert_eq!(staged_dirs(root.path()), 0);
}

#[test]
fn staging_is_removed_when_extraction_fails_midway() {
    let mut package = FailingArchive {
        inner: MemoryPackage::new()
            .with("ref/net8.0/A.dll", "MZ")
            .with("ref/net8.0/B.dll", "MZ")
            .with("ref/net8.0/C.dll", "MZ"),
        fail_on: "ref/net8.0/B.dll",
    };
    let root = tempfile::tempdir().unwrap();

    let result = extract(&mut package, Some("net8.0"), &options(root.path()), &CancelToken::new());
    assert!(matches!(result, Err(PackageError::Archive(_))));
    assert_eq!(staged_dirs(root.path()), 0);
}

#[test]
fn cancelled_extraction_leaves_nothing_behind() {
    let mut package = MemoryPackage::new()
        .with("lib/net8.0/A.dll", "MZ")
        .with("lib/net8.0/B.dll", "MZ");
    let root = tempfile::tempdir().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = extract(&mut package, None, &options(root.path()), &cancel);
    assert!(matches!(result, Err(PackageError::Cancelled)));
    assert_eq!(staged_dirs(root.path()), 0);
}

#[test]
fn corrupt_package_is_an_archive_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.nupkg");
    std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();
    assert!(matches!(ZipPackage::open(&path), Err(PackageError::Archive(_))));
    assert!(matches!(
        ZipPackage::open(&dir.path().join("missing.nupkg")),
        Err(PackageError::Io { .. })
    ));
}
