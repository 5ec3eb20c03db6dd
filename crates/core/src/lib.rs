//! surface-core: metadata-only inspection of CLI assemblies.
//!
//! Reads the ECMA-335 metadata tables of PE images directly; nothing from an
//! inspected assembly is ever executed or even mapped as code. On top of the
//! reader sit the pieces that turn metadata into API records:
//!
//! - [`MetadataContext`] -- the scoped set of inspected and platform
//!   assemblies that type references resolve against
//! - [`loader`] -- externally visible type enumeration with per-type fault
//!   isolation ([`EnumerationOutcome`])
//! - [`DocumentationIndex`] -- XML documentation lookup
//! - [`CanonicalMemberId`] -- documentation-id formatting
//! - [`SignatureRenderer`] -- [`MethodRecord`](surface_interchange::MethodRecord)
//!   construction

pub mod cancel;
pub mod context;
pub mod docid;
pub mod docs;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod names;
pub mod render;

// ── Convenience re-exports ───────────────────────────────────────────

pub use cancel::CancelToken;
pub use context::{LoadOptions, MetadataContext, Resolution, ResolvedType};
pub use docid::{CanonicalMemberId, TypePath};
pub use docs::{DocumentationEntry, DocumentationIndex};
pub use error::{DocError, FormatError, LoadError, ResolveError, SignatureError};
pub use loader::{extract_public_types, EnumerationOutcome, TypeLoadFailure};
pub use metadata::Assembly;
pub use render::{extract_methods, extract_surface, public_members, SignatureRenderer};
