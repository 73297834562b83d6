//! # docsync Store
//!
//! Local stores consumed by the reconciliation engine.
//!
//! This crate provides two store abstractions:
//! - [`DocumentStore`] - cached documents and their pending offline mutations
//! - [`TokenStore`] - partition tokens persisted between passes
//!
//! ## Available Stores
//!
//! - [`MemoryDocumentStore`] / [`MemoryTokenStore`] - For testing and ephemeral use
//! - [`FileDocumentStore`] / [`FileTokenStore`] - JSON snapshot files guarded by
//!   an advisory lock and replaced atomically on every write
//!
//! ## Example
//!
//! ```rust
//! use docsync_protocol::{OperationKind, PendingOperation};
//! use docsync_store::{DocumentStore, MemoryDocumentStore};
//!
//! let store = MemoryDocumentStore::new();
//! store.write_offline(PendingOperation::new("user", "user-1", "doc", OperationKind::Create));
//! assert_eq!(store.pending_tables().unwrap(), vec!["user".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document_store;
mod error;
mod file;
mod memory;
mod snapshot;
mod table;
mod token_store;

pub use document_store::DocumentStore;
pub use error::{StoreError, StoreResult};
pub use file::{FileDocumentStore, FileTokenStore, DOCUMENTS_FILE, TOKENS_FILE};
pub use memory::{MemoryDocumentStore, MemoryTokenStore, StoreCall};
pub use token_store::TokenStore;
