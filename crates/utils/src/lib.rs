//! Shared utilities for the chainauth workspace

pub mod tracing;
