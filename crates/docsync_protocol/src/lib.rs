//! # docsync Protocol
//!
//! Data model and JSON wire types shared by the docsync crates.
//!
//! This crate provides:
//! - [`PendingOperation`] for offline mutations awaiting replay
//! - [`OperationKind`], the closed set of replayable mutations
//! - [`TokenResult`] and [`TokensResponse`] for partition tokens
//! - [`DocumentMetadata`] and [`DocumentEnvelope`] for remote documents
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod operation;
mod token;

pub use document::{DocumentEnvelope, DocumentMetadata};
pub use error::{ProtocolError, ProtocolResult};
pub use operation::{OperationKey, OperationKind, PendingOperation};
pub use token::{TokenResult, TokenStatus, TokensRequest, TokensResponse};
