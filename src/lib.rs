//! `BucketMirror` - envelope budgeting on top of a hosted ledger platform
//!
//! This crate implements the savings distribution and reconciliation engine
//! behind a bucket-budgeting integration: ledger events against flagged
//! savings accounts in a General Ledger book are mirrored, proportionally,
//! into virtual bucket accounts held in a separate Bucket book. The engine
//! covers savings detection, three routing strategies (full, suffix-filtered
//! and override distribution), idempotent cleanup of previously mirrored
//! entries, and tolerance-based balance reconciliation between the two books.
//!
//! The HTTP/webhook layer and the remote ledger platform itself are out of
//! scope; the platform is consumed through the [`ledger::LedgerClient`]
//! trait so hosts and tests can supply their own implementations.

// Deny the most critical lints that could lead to bugs or security issues
#![deny(
    unsafe_code,
    unsafe_op_in_unsafe_fn,
    unreachable_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
// Warn on things that should be fixed but aren't necessarily bugs
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::inefficient_to_string,
    clippy::needless_pass_by_value,
    clippy::dbg_macro,
    clippy::exit,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::match_same_arms,
    clippy::semicolon_if_nothing_returned,
    clippy::wildcard_imports,
    future_incompatible,
    rust_2018_idioms,
)]
// Allow some pedantic lints that are too noisy or not applicable
#![allow(
    clippy::module_name_repetitions,  // Common pattern in Rust
    clippy::missing_errors_doc,        // Will add gradually
    clippy::missing_panics_doc,        // Will add gradually
)]

/// Engine settings - retry budgets and reconciliation tolerance
pub mod config;
/// Core business logic - detection, distribution, cleanup and reconciliation
pub mod core;
/// Unified error types and result handling
pub mod errors;
/// Typed inbound event surface consumed by the detector
pub mod events;
/// Remote ledger platform interface - DTOs and the client trait
pub mod ledger;
/// Tracing initialization for host binaries and tests
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;
