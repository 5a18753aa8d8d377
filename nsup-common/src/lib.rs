//! # nsup Common Library
//!
//! Shared code for the nsup schema loader:
//! - Common error type
//! - Bootstrap TOML configuration and its discovery
//! - Content hashing helpers

pub mod config;
pub mod error;
pub mod hashing;

pub use error::{Error, Result};
