//! Public-safety alert feed pipeline: per-source polling, fetch with
//! bounded retry, format parsing, normalization into a canonical alert
//! record, classification, idempotent persistence, cross-incident
//! correlation, and a cached staleness-aware read provider.

pub mod config;
pub mod core;
pub mod parsers;
pub mod pipeline;
pub mod sources;
