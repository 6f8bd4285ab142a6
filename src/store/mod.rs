//! In-memory document stores mirrored to a key-value backend.
//!
//! ```text
//! <store dir>/
//!   <id>.yaml
//!   <id>.yaml
//! ```
//!
//! Every operation holds the store's single lock for its full duration,
//! including backend I/O, so operations on one store are totally ordered.

mod backend;
mod document;
mod error;

pub use backend::{validate_key, Backend, DirBackend, MemoryBackend};
pub use document::{Document, DocumentStore};
pub use error::StoreError;
