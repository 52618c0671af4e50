//! Wire models for the object storage and catalog backend.
//!
//! These mirror what the remote service actually returns, which is loosely
//! typed: most fields may be missing or carry an unexpected JSON type. The
//! host crate converts them into strict internal types at the boundary.

pub mod models;
