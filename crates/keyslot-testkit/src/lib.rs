//! # keyslot testkit
//!
//! Testing utilities for keyslot.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Values paired with the exact documents the codec must produce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A registry over an in-memory backend, plus a counting listener
//!
//! ## Golden Vectors
//!
//! ```rust
//! use keyslot_testkit::vectors::verify_all_vectors;
//!
//! for report in verify_all_vectors() {
//!     assert!(report.passed(), "{} failed: {}", report.name, report.actual);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use keyslot_testkit::generators::value;
//!
//! proptest! {
//!     #[test]
//!     fn clone_is_equal(v in value()) {
//!         prop_assert_eq!(v.clone(), v);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use keyslot_testkit::fixtures::{prefs, RecordingListener, TestFixture};
//!
//! let fixture = TestFixture::new();
//! fixture.persistent("prefs", prefs("dark", 10));
//! let listener = RecordingListener::new();
//! fixture.registry.subscribe("prefs", listener.clone());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{prefs, RecordingListener, TestFixture};
pub use generators::{record, value};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector, VectorReport};
