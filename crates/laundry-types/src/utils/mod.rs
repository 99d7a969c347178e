//! Utility functions shared across crates.

pub mod formatting;

pub use formatting::truncate_id;
