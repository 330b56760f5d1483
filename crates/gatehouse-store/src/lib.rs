//! Gatehouse remote storage layer.
//!
//! A small directory-oriented API (list / mkdir / upload / download /
//! delete) over a remote file tree, with a WebDAV implementation.
//! Snapshot logic lives in `gatehouse-snapshot`; this crate knows nothing
//! about snapshot names.

pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod store;
pub mod webdav;

pub use config::{WebDavConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::RemoteError;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
pub use store::{join, normalize, split_parent, MkdirOutcome, RemoteStore};
pub use webdav::WebDavStore;
