//! # SSIKV Testkit
//!
//! Test utilities for SSIKV.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - A model-checked integration harness
//! - Stress testing utilities
//! - Scenario test vectors exportable as JSON
//!
//! ## Usage
//!
//! ```rust
//! use ssikv_testkit::prelude::*;
//!
//! with_temp_db(|db| {
//!     let handle = db
//!         .put_or_update(|txn| txn.put_or_update("HDD", "Hard disk"))
//!         .unwrap();
//!     wait_applied(&handle);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
pub use vectors::*;
