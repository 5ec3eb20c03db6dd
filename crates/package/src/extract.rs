//! Variant selection and extraction into a staging directory.
//!
//! Binaries come from `ref/<tfm>/` when that group exists for the selected
//! variant, otherwise from `lib/<tfm>/`. Binaries placed directly under
//! `lib/` form the `any` variant. Everything is written into a fresh
//! staging directory owned by a [`StagingDir`] guard, so every exit path
//! removes it.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use surface_core::CancelToken;

use crate::archive::PackageArchive;
use crate::error::PackageError;
use crate::framework::{Framework, VariantSelection};

const BINARY_EXTENSIONS: [&str; 3] = ["dll", "exe", "winmd"];

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub include_docs: bool,
    /// Parent directory for staging directories. Defaults to the system
    /// temporary directory.
    pub staging_root: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            include_docs: true,
            staging_root: None,
        }
    }
}

/// The file group binaries were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileGroup {
    /// `ref/<tfm>/`
    Reference,
    /// `lib/<tfm>/`
    Implementation,
}

impl fmt::Display for FileGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileGroup::Reference => "ref",
            FileGroup::Implementation => "lib",
        })
    }
}

// ──────────────────────────────────────────────
// Staging
// ──────────────────────────────────────────────

/// A uniquely named staging directory, removed on drop. Removal failures
/// are logged and otherwise ignored.
#[derive(Debug)]
pub struct StagingDir {
    dir: Option<tempfile::TempDir>,
    path: PathBuf,
}

impl StagingDir {
    pub fn create(root: Option<&Path>) -> Result<Self, PackageError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("surface-staging-");
        let created = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        let dir = created.map_err(|source| PackageError::Io {
            path: root.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
            source,
        })?;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "created staging directory");
        Ok(StagingDir {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => tracing::debug!(path = %self.path.display(), "removed staging directory"),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove staging directory"
                ),
            }
        }
    }
}

// ──────────────────────────────────────────────
// Outcome
// ──────────────────────────────────────────────

/// Binaries of one variant, staged on disk. Dropping it removes the files.
#[derive(Debug)]
pub struct Extraction {
    pub staging: StagingDir,
    /// Staged binaries, sorted by path.
    pub binaries: Vec<PathBuf>,
    /// Staged documentation files, named `<binary stem>.xml`.
    pub docs: Vec<PathBuf>,
    pub selection: VariantSelection,
    pub group: FileGroup,
}

/// Why no variant could be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// The package ships no binaries in any variant.
    NoBinaries,
    /// The requested variant name is not a known framework and no variant
    /// carries that exact name.
    VariantNotFound,
    /// No variant is compatible with the requested or inferred target.
    NoCompatibleVariant,
}

impl Unresolved {
    /// Reason a selection over `available` came back empty.
    pub fn classify(requested: Option<&str>, available: &[Framework]) -> Self {
        if available.is_empty() {
            Unresolved::NoBinaries
        } else if requested.is_some_and(|r| Framework::parse(r).is_opaque()) {
            Unresolved::VariantNotFound
        } else {
            Unresolved::NoCompatibleVariant
        }
    }
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unresolved::NoBinaries => "package contains no binaries",
            Unresolved::VariantNotFound => "variant not found",
            Unresolved::NoCompatibleVariant => "no compatible variant",
        })
    }
}

#[derive(Debug)]
pub enum ExtractOutcome {
    Extracted(Extraction),
    Unresolved {
        selection: VariantSelection,
        reason: Unresolved,
    },
}

// ──────────────────────────────────────────────
// Entry layout
// ──────────────────────────────────────────────

/// A `ref/` or `lib/` entry directly inside a variant folder.
#[derive(Debug, Clone)]
struct VariantEntry {
    name: String,
    group: FileGroup,
    variant: String,
    file: String,
}

impl VariantEntry {
    fn parse(name: &str) -> Option<Self> {
        let normalized = name.replace('\\', "/");
        let parts: Vec<&str> = normalized.split('/').collect();
        let group = match parts.first().map(|p| p.to_ascii_lowercase()).as_deref() {
            Some("ref") => FileGroup::Reference,
            Some("lib") => FileGroup::Implementation,
            _ => return None,
        };
        let (variant, file) = match parts.as_slice() {
            [_, file] if group == FileGroup::Implementation => (Framework::ANY.to_string(), *file),
            [_, variant, file] => (variant.to_ascii_lowercase(), *file),
            _ => return None,
        };
        Some(VariantEntry {
            name: name.to_string(),
            group,
            variant,
            file: file.to_string(),
        })
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.file)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    fn is_binary(&self) -> bool {
        self.extension()
            .is_some_and(|e| BINARY_EXTENSIONS.contains(&e.as_str()))
    }

    fn is_doc(&self) -> bool {
        self.extension().as_deref() == Some("xml")
    }

    fn stem(&self) -> &str {
        Path::new(&self.file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file)
    }

    /// A file name that stays inside the staging directory.
    fn is_safe(&self) -> bool {
        !self.file.is_empty()
            && self.file != "."
            && self.file != ".."
            && !self.file.contains(':')
            && self.variant != ".."
            && self.variant != "."
    }
}

fn variant_entries(names: Vec<String>) -> Vec<VariantEntry> {
    let mut entries = Vec::new();
    for name in names {
        let Some(entry) = VariantEntry::parse(&name) else {
            continue;
        };
        if !entry.is_binary() && !entry.is_doc() {
            continue;
        }
        if !entry.is_safe() {
            tracing::warn!(entry = %name, "skipping package entry with unsafe name");
            continue;
        }
        entries.push(entry);
    }
    entries
}

/// Variants that carry at least one binary, sorted.
pub fn list_variants<A: PackageArchive + ?Sized>(archive: &A) -> Vec<Framework> {
    variants_of(&variant_entries(archive.entries()))
}

fn variants_of(entries: &[VariantEntry]) -> Vec<Framework> {
    let mut variants: Vec<Framework> = entries
        .iter()
        .filter(|e| e.is_binary())
        .map(|e| Framework::parse(&e.variant))
        .collect();
    variants.sort();
    variants.dedup();
    variants
}

// ──────────────────────────────────────────────
// Extraction
// ──────────────────────────────────────────────

/// Select a variant of `archive` and stage its binaries.
///
/// `requested` names a target framework; without one the target is
/// inferred from the variants the package ships. Failure to pick a variant
/// is an [`ExtractOutcome::Unresolved`], not an error.
pub fn extract<A: PackageArchive + ?Sized>(
    archive: &mut A,
    requested: Option<&str>,
    options: &ExtractOptions,
    cancel: &CancelToken,
) -> Result<ExtractOutcome, PackageError> {
    let entries = variant_entries(archive.entries());
    let available = variants_of(&entries);
    let selection = VariantSelection::resolve(requested, &available);

    let Some(selected) = selection.selected.clone() else {
        let reason = Unresolved::classify(requested, &available);
        tracing::debug!(target_framework = %selection.target, %reason, "no variant selected");
        return Ok(ExtractOutcome::Unresolved { selection, reason });
    };

    let in_group = |group: FileGroup| -> Vec<&VariantEntry> {
        entries
            .iter()
            .filter(|e| e.group == group && e.variant == selected && e.is_binary())
            .collect()
    };
    let (group, binaries) = match in_group(FileGroup::Reference) {
        refs if !refs.is_empty() => (FileGroup::Reference, refs),
        _ => {
            tracing::debug!(variant = %selected, "no reference group, using implementation group");
            (FileGroup::Implementation, in_group(FileGroup::Implementation))
        }
    };
    tracing::info!(
        target_framework = %selection.target,
        variant = %selected,
        group = %group,
        binaries = binaries.len(),
        "selected variant"
    );

    let docs = if options.include_docs {
        documentation_for(&entries, &selected, &binaries)
    } else {
        Vec::new()
    };

    let staging = StagingDir::create(options.staging_root.as_deref())?;
    let mut staged_binaries = Vec::with_capacity(binaries.len());
    for entry in &binaries {
        staged_binaries.push(stage(archive, entry, &entry.file, &staging, cancel)?);
    }
    let mut staged_docs = Vec::with_capacity(docs.len());
    for (entry, file) in &docs {
        staged_docs.push(stage(archive, entry, file, &staging, cancel)?);
    }
    staged_binaries.sort();
    staged_docs.sort();

    Ok(ExtractOutcome::Extracted(Extraction {
        staging,
        binaries: staged_binaries,
        docs: staged_docs,
        selection,
        group,
    }))
}

/// One `<stem>.xml` per binary: the implementation group's copy first,
/// then the reference group's. Paired with the file name it is staged
/// under, next to its binary.
fn documentation_for<'a>(
    entries: &'a [VariantEntry],
    variant: &str,
    binaries: &[&VariantEntry],
) -> Vec<(&'a VariantEntry, String)> {
    let mut by_stem: BTreeMap<String, &'a VariantEntry> = BTreeMap::new();
    for doc in entries.iter().filter(|e| e.variant == variant && e.is_doc()) {
        let stem = doc.stem().to_ascii_lowercase();
        let replace = match by_stem.get(&stem) {
            Some(existing) => {
                existing.group == FileGroup::Reference && doc.group == FileGroup::Implementation
            }
            None => true,
        };
        if replace {
            by_stem.insert(stem, doc);
        }
    }
    binaries
        .iter()
        .filter_map(|b| {
            let doc = by_stem.get(&b.stem().to_ascii_lowercase())?;
            Some((*doc, format!("{}.xml", b.stem())))
        })
        .collect()
}

fn stage<A: PackageArchive + ?Sized>(
    archive: &mut A,
    entry: &VariantEntry,
    file_name: &str,
    staging: &StagingDir,
    cancel: &CancelToken,
) -> Result<PathBuf, PackageError> {
    if cancel.is_cancelled() {
        return Err(PackageError::Cancelled);
    }
    let dest = staging.path().join(file_name);
    let mut file = File::create(&dest).map_err(|source| PackageError::Io {
        path: dest.clone(),
        source,
    })?;
    let bytes = archive.copy_entry(&entry.name, &mut file)?;
    tracing::debug!(entry = %entry.name, bytes, "staged package entry");
    Ok(dest)
}
