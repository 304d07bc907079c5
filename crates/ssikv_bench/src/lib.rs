//! Shared helpers for the SSIKV benchmarks.

pub mod utils;
