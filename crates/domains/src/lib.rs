//! # domains
//!
//! The central domain model and interface definitions for the post engine.

pub mod error;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
