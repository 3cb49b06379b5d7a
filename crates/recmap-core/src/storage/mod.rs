//! Storage layer for recmap.
//!
//! This module provides a sled-based row store with per-type id sequences
//! and a unique index.

mod config;
mod engine;
mod record;
mod unique_index;

pub mod key;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use record::{Record, StoredAttribute};
pub use unique_index::UniqueIndex;
