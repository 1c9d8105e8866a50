//! Core types shared by every stage of limit discovery.
//!
//! - [`Error`] - error taxonomy (fatal config errors vs. recoverable
//!   resource/metadata failures)
//! - [`Result`] - crate result alias

mod error;

pub use error::{Error, Result};
