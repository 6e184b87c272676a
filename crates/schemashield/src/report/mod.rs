//! Schema inference from captured traffic.
//!
//! The aggregator folds the whole capture log into a minimal OpenAPI-shaped
//! document (paths → methods → observed status codes) and persists it as
//! YAML, replacing any previous version.
//!
//! # Module Structure
//!
//! - `document` - Schema document types and the insert-if-absent fold
//! - `generator` - Full-log aggregation and persistence

mod document;
mod generator;

pub use document::{Info, Operation, PathItem, ResponseEntry, SchemaDocument, OPENAPI_VERSION};
pub use generator::{aggregate, write_document, ReportError, ReportGenerator};
