//! Shared infrastructure: error types and constants

pub mod consts;
pub mod error;

pub use error::{Error, Result};
