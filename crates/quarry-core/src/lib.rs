//! quarry-core - Core types and traits for the retrieval engine
//!
//! This crate provides the foundational types, collaborator traits, error
//! handling and configuration used throughout the quarry workspace.

pub mod config;
pub mod error;
pub mod fields;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{QuarryError, Result};
pub use traits::*;
pub use types::*;
