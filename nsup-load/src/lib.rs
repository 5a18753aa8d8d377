//! nsup-load library interface
//!
//! Exposes the load workflow and its components for integration testing.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{LoadError, LoadResult};
