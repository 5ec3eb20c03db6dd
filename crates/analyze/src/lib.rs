//! surface-analyze: structural comparison of two extracted API surfaces.
//!
//! The engine consumes [`ApiSurface`](surface_interchange::ApiSurface)
//! values, never binaries, so snapshots from any source can be compared.
//! The result is a [`DiffResult`](surface_interchange::DiffResult) with
//! breaking changes classified.

pub mod diff;

pub use diff::compare;
