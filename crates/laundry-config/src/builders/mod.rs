//! Builders for constructing configurations in tests and local development.

pub mod config;
