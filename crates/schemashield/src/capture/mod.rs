//! Capture persistence for proxied exchanges.
//!
//! Every request/response pair the forwarder observes becomes one immutable
//! [`Capture`] row in an append-only SQLite log. The log is read back by the
//! schema aggregator (full scan in insertion order) and by the mock responder
//! (latest row for a path).
//!
//! # Module Structure
//!
//! - `types` - Capture records and the ingest payload
//! - `store` - SQLite-backed append-only store
//! - `iter` - Paged lazy iteration over the whole log

mod iter;
mod store;
mod types;

pub use iter::CaptureIter;
pub use store::{CaptureStore, StoreError, DEFAULT_PAGE_SIZE};
pub use types::{route_path, Capture, HeaderFields, InvalidCapture, NewCapture};
