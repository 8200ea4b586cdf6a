//! # Storage
//!
//! Disk-backed persistence for the registry, built on the redb embedded
//! database.

pub mod redb_store;

pub use redb_store::DocStore;
