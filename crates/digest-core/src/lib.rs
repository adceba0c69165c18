//! digest-core
//!
//! Domain types, configuration, the error type and the leaf stages of the
//! archive Q&A pipeline: the filesystem archive store, the document loader
//! (markup to plain text) and the chunker.

pub mod archive;
pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
