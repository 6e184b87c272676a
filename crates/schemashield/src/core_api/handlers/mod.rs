//! Core API endpoint handlers.

pub mod captures;
pub mod mock;
pub mod report;
pub mod system;
