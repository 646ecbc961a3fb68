//! roomcast Shared Types and Utilities
//!
//! This crate contains identifier types and errors shared across the roomcast workspace.

pub mod error;
pub mod types;

pub use error::*;
pub use types::*;
