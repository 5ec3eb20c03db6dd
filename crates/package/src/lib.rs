//! surface-package: reading `.nupkg` archives and staging one target
//! framework variant of their binaries for inspection.

pub mod archive;
pub mod error;
pub mod extract;
pub mod framework;
pub mod nuspec;

pub use archive::{MemoryPackage, PackageArchive, ZipPackage};
pub use error::PackageError;
pub use extract::{
    extract, list_variants, ExtractOptions, ExtractOutcome, Extraction, FileGroup, StagingDir,
    Unresolved,
};
pub use framework::{
    infer_target, select_nearest, Framework, FrameworkFamily, FrameworkVersion, VariantSelection,
};
pub use nuspec::{Dependency, DependencyGroup, NuspecManifest};
