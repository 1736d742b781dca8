//! Real-time host telemetry agent: a fixed-interval scheduler samples the
//! local machine through fallible per-category queries, merges the results
//! into one normalized snapshot, and fans it out to every connected
//! WebSocket subscriber.

pub mod aggregate;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod source;
pub mod state;
pub mod types;
pub mod ws;
