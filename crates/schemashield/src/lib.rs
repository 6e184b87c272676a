// Library exports for the schemashield binary and integration tests

// ===== Capture pipeline =====
pub mod capture;
pub mod mock;
pub mod proxy;
pub mod report;

// ===== Service surface =====
pub mod config;
pub mod core_api;
pub mod metrics;

pub use capture::{Capture, CaptureStore, NewCapture, StoreError};
pub use config::Config;
pub use mock::{MockOutcome, MockResponder};
pub use report::{ReportGenerator, SchemaDocument};
