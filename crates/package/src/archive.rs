//! Package archive access.
//!
//! A [`PackageArchive`] exposes the entry names of a package and streams
//! individual entries out. `.nupkg` files are zip archives read through
//! [`ZipPackage`]; [`MemoryPackage`] holds entries in memory.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::error::PackageError;

/// Read access to the entries of a package.
pub trait PackageArchive {
    /// Entry names, `/`-separated, excluding directory entries.
    fn entries(&self) -> Vec<String>;

    /// Copy one entry into `out`, returning the number of bytes written.
    fn copy_entry(&mut self, name: &str, out: &mut dyn Write) -> Result<u64, PackageError>;

    /// Read one entry fully into memory.
    fn read_entry(&mut self, name: &str) -> Result<Vec<u8>, PackageError> {
        let mut buf = Vec::new();
        self.copy_entry(name, &mut buf)?;
        Ok(buf)
    }
}

// ──────────────────────────────────────────────
// Zip
// ──────────────────────────────────────────────

/// A zip-based package such as a `.nupkg` file.
pub struct ZipPackage<R> {
    archive: zip::ZipArchive<R>,
    source: PathBuf,
}

impl ZipPackage<File> {
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let file = File::open(path).map_err(|source| PackageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut package = ZipPackage::from_reader(file)?;
        package.source = path.to_path_buf();
        Ok(package)
    }
}

impl<R: Read + Seek> ZipPackage<R> {
    pub fn from_reader(reader: R) -> Result<Self, PackageError> {
        let archive = zip::ZipArchive::new(reader)
            .map_err(|e| PackageError::Archive(e.to_string()))?;
        Ok(ZipPackage {
            archive,
            source: PathBuf::new(),
        })
    }

    /// The file this package was opened from, if any.
    pub fn source(&self) -> Option<&Path> {
        (!self.source.as_os_str().is_empty()).then_some(self.source.as_path())
    }
}

impl<R: Read + Seek> PackageArchive for ZipPackage<R> {
    fn entries(&self) -> Vec<String> {
        self.archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect()
    }

    fn copy_entry(&mut self, name: &str, out: &mut dyn Write) -> Result<u64, PackageError> {
        let mut entry = self.archive.by_name(name).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => PackageError::EntryNotFound(name.to_string()),
            other => PackageError::Archive(format!("{}: {}", name, other)),
        })?;
        io::copy(&mut entry, out).map_err(|e| PackageError::Archive(format!("{}: {}", name, e)))
    }
}

// ──────────────────────────────────────────────
// Memory
// ──────────────────────────────────────────────

/// Entries held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryPackage {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryPackage {
    pub fn new() -> Self {
        MemoryPackage::default()
    }

    pub fn with(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(name.to_string(), bytes.into());
    }
}

impl PackageArchive for MemoryPackage {
    fn entries(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn copy_entry(&mut self, name: &str, out: &mut dyn Write) -> Result<u64, PackageError> {
        let bytes = self
            .entries
            .get(name)
            .ok_or_else(|| PackageError::EntryNotFound(name.to_string()))?;
        out.write_all(bytes)
            .map_err(|e| PackageError::Archive(format!("{}: {}", name, e)))?;
        Ok(bytes.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use zip::write::SimpleFileOptions;

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory("lib/", SimpleFileOptions::default()).unwrap();
        for (name, bytes) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn zip_entries_skip_directories() {
        let bytes = zip_bytes(&[("lib/net8.0/A.dll", b"MZ"), ("A.nuspec", b"<package/>")]);
        let mut package = ZipPackage::from_reader(Cursor::new(bytes)).unwrap();
        let mut names = package.entries();
        names.sort();
        assert_eq!(names, vec!["A.nuspec", "lib/net8.0/A.dll"]);
        assert_eq!(package.read_entry("lib/net8.0/A.dll").unwrap(), b"MZ");
        assert!(package.source().is_none());
    }

    #[test]
    fn missing_entry_is_reported() {
        let bytes = zip_bytes(&[("a.txt", b"x")]);
        let mut package = ZipPackage::from_reader(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            package.read_entry("b.txt"),
            Err(PackageError::EntryNotFound(name)) if name == "b.txt"
        ));
    }

    #[test]
    fn non_zip_input_is_an_archive_error() {
        let result = ZipPackage::from_reader(Cursor::new(b"not a zip".to_vec()));
        assert!(matches!(result, Err(PackageError::Archive(_))));
    }

    #[test]
    fn memory_package_round_trips_entries() {
        let mut package = MemoryPackage::new().with("lib/any.dll", vec![1, 2, 3]);
        assert_eq!(package.entries(), vec!["lib/any.dll"]);
        let mut out = Vec::new();
        assert_eq!(package.copy_entry("lib/any.dll", &mut out).unwrap(), 3);
        assert_eq!(out, vec![1, 2, 3]);
    }
}
