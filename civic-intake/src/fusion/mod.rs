//! Signal fusion
//!
//! Combines independent duplicate signals (visual similarity, spatial
//! proximity) into one verdict.

pub mod duplicate_resolver;

pub use duplicate_resolver::{DuplicateResolution, DuplicateResolver};
