//! Remote ledger platform interface.
//!
//! The engine never talks to the hosted bookkeeping platform directly; it
//! consumes the capability surface below through the [`LedgerClient`] trait.
//! Hosts supply an HTTP-backed implementation, tests supply the in-memory
//! fake from `test_utils`. Nothing in this crate holds credentials or any
//! process-wide platform handle: a client value is passed into every call.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Property names that form the operational contract with the ledger
/// platform. These are configured by the operator on books, accounts and
/// transactions; the engine reads and writes them verbatim.
pub mod props {
    /// On the GL book: id of the Bucket book within the same collection.
    pub const BUCKET_BOOK_ID: &str = "bucket_book_id";
    /// On GL accounts/groups: `"true"`/`"false"` savings participation flag.
    pub const SAVINGS: &str = "savings";
    /// On the Bucket book: name of the income clearing account.
    pub const BUCKET_INCOME_ACC: &str = "bucket_income_acc";
    /// On the Bucket book: name of the withdrawal clearing account.
    pub const BUCKET_WITHDRAWAL_ACC: &str = "bucket_withdrawal_acc";
    /// On the Bucket book: hashtag appended to generated descriptions.
    pub const BUCKET_HASHTAG: &str = "bucket_hashtag";
    /// On Bucket-book asset accounts: share of distributions, 0-100.
    pub const PERCENTAGE: &str = "percentage";
    /// On a GL transaction: explicit comma-separated bucket override list.
    pub const BUCKET_OVERRIDE: &str = "bucket";
    /// On generated entries: id of the originating savings account.
    pub const GL_ACCOUNT_ID: &str = "gl_account_id";
}

/// Default income clearing account name when the Bucket book does not
/// configure `bucket_income_acc`.
pub const DEFAULT_INCOME_ACC: &str = "Savings";
/// Default withdrawal clearing account name when the Bucket book does not
/// configure `bucket_withdrawal_acc`.
pub const DEFAULT_WITHDRAWAL_ACC: &str = "Withdrawal";

/// A ledger (book) hosted on the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub name: String,
    /// Collection the book belongs to; sibling books share a collection.
    pub collection_id: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Book {
    /// Returns the book property `key`, if set and non-empty.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Account type on the platform. Only asset accounts participate in bucket
/// mirroring; the other kinds exist so DTOs round-trip faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Asset,
    Liability,
    Incoming,
    Outgoing,
}

/// A group of accounts, carrying its own properties. Savings participation
/// and routing suffixes may be configured at group level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Group {
    /// Returns the group property `key`, if set and non-empty.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// An account within a book, with its properties and group memberships.
/// Group order follows the platform's listing order; detection and suffix
/// derivation rely on that order being stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub kind: AccountKind,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Account {
    /// Returns the account property `key`, if set and non-empty.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// A transaction as stored on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub credit_account_id: String,
    pub debit_account_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Opaque caller-supplied identifiers; the engine encodes
    /// `{source_id}_{normalized_bucket_name}_{timestamp}` here.
    #[serde(default)]
    pub remote_ids: Vec<String>,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub checked: bool,
}

/// A transaction to be created on the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub credit_account_id: String,
    pub debit_account_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub remote_ids: Vec<String>,
}

/// One page of a transaction search. `cursor` is `None` on the final page.
#[derive(Debug, Clone, Default)]
pub struct TransactionPage {
    pub transactions: Vec<LedgerTransaction>,
    pub cursor: Option<String>,
}

/// One row of a balance report: the cumulative balance of a matched
/// account grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_name: String,
    pub cumulative_balance: f64,
}

/// Capability surface of the remote ledger platform.
///
/// All calls are awaited; the platform serializes batched writes per book.
/// Implementations must be safe to share across invocations (`Send + Sync`)
/// but the engine itself performs no locking.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetches a book with its configuration properties.
    async fn get_book(&self, book_id: &str) -> Result<Book>;

    /// Lists all books in a collection (the queried book included).
    async fn list_collection_books(&self, collection_id: &str) -> Result<Vec<Book>>;

    /// Lists accounts in a book, optionally restricted by kind, with
    /// properties and group memberships populated.
    async fn list_accounts(&self, book_id: &str, kind: Option<AccountKind>)
    -> Result<Vec<Account>>;

    /// Fetches a single account by id.
    async fn get_account(&self, book_id: &str, account_id: &str) -> Result<Option<Account>>;

    /// Looks up an account by exact name.
    async fn find_account_by_name(&self, book_id: &str, name: &str) -> Result<Option<Account>>;

    /// Searches transactions with a platform query string, returning one
    /// page per call. Pass the previous page's cursor to continue.
    async fn search_transactions(
        &self,
        book_id: &str,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionPage>;

    /// Creates and persists a new transaction.
    async fn create_transaction(
        &self,
        book_id: &str,
        transaction: NewTransaction,
    ) -> Result<LedgerTransaction>;

    /// Batch soft-delete. With `uncheck`, previously reconciled entries are
    /// un-checked as part of the same call.
    async fn trash_transactions(&self, book_id: &str, ids: &[String], uncheck: bool)
    -> Result<()>;

    /// Batch mark transactions as checked (reconciled).
    async fn check_transactions(&self, book_id: &str, ids: &[String]) -> Result<()>;

    /// Fetches a single transaction by id. Used for trash verification.
    async fn get_transaction(
        &self,
        book_id: &str,
        transaction_id: &str,
    ) -> Result<Option<LedgerTransaction>>;

    /// Fetches a balance report scoped by a query expression, one cumulative
    /// balance per matched account.
    async fn balances(&self, book_id: &str, query: &str) -> Result<Vec<AccountBalance>>;
}
