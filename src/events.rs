//! Typed inbound event surface.
//!
//! The webhook/HTTP layer that receives platform events lives outside this
//! crate; it deserializes payloads into these types and drives the engine.
//! Six event kinds exist: four transaction-lifecycle kinds and two
//! account-lifecycle kinds. Account-lifecycle events carry no transaction
//! and use the account id as a synthetic source identifier downstream.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

/// The kind of ledger event being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TransactionPosted,
    TransactionUpdated,
    TransactionDeleted,
    TransactionUntrashed,
    AccountUpdated,
    AccountDeleted,
}

impl EventKind {
    /// Whether handling this event must clean up previously mirrored
    /// entries before any (re)distribution happens.
    #[must_use]
    pub fn requires_cleanup(self) -> bool {
        !matches!(self, Self::TransactionPosted)
    }
}

/// The transaction embedded in a transaction-lifecycle event, crediting one
/// account and debiting another. `amount` is kept as the platform's decimal
/// string and parsed only at distribution time.
#[derive(Debug, Clone, Deserialize)]
pub struct EventTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: String,
    #[serde(default)]
    pub description: String,
    pub credit_account_id: String,
    pub debit_account_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// An inbound ledger event as delivered by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerEvent {
    pub kind: EventKind,
    /// The GL book the event originated in.
    pub book_id: String,
    /// Present for transaction-lifecycle events.
    pub transaction: Option<EventTransaction>,
    /// Present for account-lifecycle events.
    pub account_id: Option<String>,
}
