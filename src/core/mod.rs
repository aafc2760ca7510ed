//! Core business logic - framework-agnostic detection, distribution,
//! cleanup and reconciliation operations.
//!
//! Control flow for one inbound event: [`detector`] decides whether the
//! event concerns a savings account; [`percentages`] re-checks the bucket
//! configuration invariant; one of the [`distribution`] strategies mirrors
//! the amount into bucket accounts; [`reconcile`] cross-checks totals. For
//! edit/delete/account-lifecycle events, [`matcher`] and [`cleanup`] run
//! first so redistribution never races stale entries.

/// Trash + bounded-retry verification, composed cleanup entry points
pub mod cleanup;
/// Savings detection producing a `SavingsContext`
pub mod detector;
/// The three distribution strategies
pub mod distribution;
/// Paginated lookup of previously mirrored entries
pub mod matcher;
/// Bucket percentage configuration invariant
pub mod percentages;
/// GL vs Bucket book balance reconciliation
pub mod reconcile;
/// Suffix extraction and name normalization
pub mod suffix;
