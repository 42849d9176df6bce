//! Shared types, error definitions, and utilities used across all tandem crates.

pub mod error;
pub mod tls;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    types::Platform,
};
