//! # storage-adapters
//!
//! Persistence and object-store implementations of the `domains` ports.
//! The in-memory adapters are always compiled; the rest are feature-gated
//! so the binary only links the backends it is built for.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "media-local")]
pub mod local_media;

#[cfg(feature = "media-s3")]
pub mod s3_media;

pub use memory::{InMemoryPostRepository, InMemoryUserDirectory};

#[cfg(feature = "db-postgres")]
pub use postgres::{PgPostRepository, PgUserDirectory};

#[cfg(feature = "media-local")]
pub use local_media::LocalMediaStore;

#[cfg(feature = "media-s3")]
pub use s3_media::{S3MediaStore, S3Options};
