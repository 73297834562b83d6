//! # docsync_engine
//!
//! Reconciliation engine for offline document writes.
//!
//! Writes made while the device is offline are kept in a local store as
//! pending operations. When connectivity returns, the [`Reconciler`] replays
//! each of them against the remote document service and settles the local
//! row according to the outcome.
//!
//! ## Per-operation flow
//!
//! ```text
//! pending row ──► token (cache or exchange) ──► remote write
//!                      │                             │
//!                  failure                 success / failure
//!                      │                             │
//!                  notify error         update or delete row, notify
//! ```
//!
//! - Unsupported operation kinds are skipped without any side effect
//! - Successful creates and replaces are kept locally as synced rows,
//!   unless they expired in the meantime
//! - Successful deletes, conflicting deletes (404 / 409) and expired
//!   operations are removed from the local store
//! - Every other failure leaves the row pending for the next pass
//!
//! ## Design principles
//!
//! - The engine performs no I/O of its own; storage and HTTP are traits
//! - One pass per table at a time; operations within a table run in order
//! - The listener and clock are injected at construction

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod http;
mod listener;
mod reconcile;
mod remote;
mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ReconcileConfig, DEFAULT_DOCUMENT_ENDPOINT, DEFAULT_TOKEN_EXCHANGE_URL};
pub use error::{DocumentError, EngineError, EngineResult, HttpError};
pub use http::{
    HttpClient, HttpRequest, HttpResponse, Method, MockHttpClient, APPLICATION_JSON,
    AUTHORIZATION, CONTENT_TYPE,
};
pub use listener::{
    ChannelListener, OperationEvent, OperationListener, OperationResult, RecordingListener,
};
pub use reconcile::{ReconcileReport, ReconcileStats, Reconciler};
pub use remote::{RemoteDocumentClient, RemoteWrite, UPSERT_HEADER};
pub use token::{TokenExchangeClient, TokenProvider, APP_SECRET_HEADER};
