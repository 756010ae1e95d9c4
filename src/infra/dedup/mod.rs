//! Dedup store implementations.

pub mod file;

pub use file::{DEFAULT_DEDUP_DIR, FileDedupStore};
