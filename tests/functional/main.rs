// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the admission pipeline.
//!
//! These tests drive serialized AdmissionReviews through the decision engine
//! with fake registry login and verifier capabilities. No cluster, registry
//! or signing tool is required.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run with verbose output
//! cargo test --test functional -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! - **Scenario tests**: end-to-end reviews (verify on change, pass-through,
//!   denial detail, malformed envelopes)
//! - **Concurrency tests**: shared registry session under parallel reviews
//!   and abandoned requests

#[path = "../common/mod.rs"]
mod common;

mod concurrency_tests;
mod scenario_tests;
