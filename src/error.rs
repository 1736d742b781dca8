//! Error taxonomy for the sampling pipeline.
//!
//! A failed category query (`QueryError`) degrades to that category's
//! default during aggregation. A `CycleError` means the tick cannot produce
//! a snapshot at all; the scheduler skips that tick's publish and carries on.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("metric source unavailable: {0}")]
    Unavailable(String),
    #[error("malformed reading: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error("process list query failed: {0}")]
    ProcessQuery(#[source] QueryError),
}
