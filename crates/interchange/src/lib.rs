//! surface-interchange: records exchanged between the extraction, diff and
//! command layers.
//!
//! Every record serializes with camelCase field names and omits absent
//! optional fields, so the command layer can print them directly as JSON.
//! Lists produced by the core crates are already sorted; nothing here
//! reorders on serialization.

pub mod deserialize;
pub mod diff;
pub mod identity;
pub mod types;

pub use deserialize::{surface_from_json, InterchangeError};
pub use diff::{DiffIdentity, DiffItem, DiffReason, DiffResult};
pub use identity::{PackageIdentity, PackageVersion, RequestError};
pub use types::*;
