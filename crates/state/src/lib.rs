//! Durable state for the filedrop upload service.
//!
//! A single JSON document of the shape `{ users: { <userKey>: UserRecord } }`
//! backed by one file on disk. All access is serialized through a
//! single-writer queue; writes replace the whole file atomically.

pub mod document;
pub mod error;
pub mod store;

pub use document::StateDocument;
pub use error::{StateError, StateResult};
pub use store::StateStore;
