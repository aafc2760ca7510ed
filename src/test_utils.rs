//! Shared test utilities for `BucketMirror`.
//!
//! Provides [`MemoryLedger`], an in-memory [`LedgerClient`] implementation
//! honoring the query forms the engine actually issues (hashtag + date,
//! `gl_account_id` property, combined `account:'..'` balance queries), plus
//! a builder for the standard two-book fixture and helpers for constructing
//! contexts and entries with sensible defaults.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{
    collections::BTreeMap,
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    core::detector::{Direction, SavingsContext},
    errors::{Error, Result},
    events::EventTransaction,
    ledger::{
        props, Account, AccountBalance, AccountKind, Book, Group, LedgerClient,
        LedgerTransaction, NewTransaction, TransactionPage,
    },
};

/// The fixed date used by fixture transactions.
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

/// An event transaction with fixture defaults: the standard date and an
/// empty property map.
pub fn savings_event_transaction(
    id: &str,
    amount: &str,
    credit_account_id: &str,
    debit_account_id: &str,
) -> EventTransaction {
    EventTransaction {
        id: id.to_owned(),
        date: test_date(),
        amount: amount.to_owned(),
        description: "Test transaction".to_owned(),
        credit_account_id: credit_account_id.to_owned(),
        debit_account_id: debit_account_id.to_owned(),
        properties: BTreeMap::new(),
    }
}

/// A deposit context against the standard fixture: source account
/// `RDB LONG`, Bucket book `bkt`, default clearing account names, no
/// suffix, no override.
pub fn deposit_context(transaction_id: &str, amount: &str) -> SavingsContext {
    SavingsContext {
        bucket_book_id: "bkt".to_owned(),
        transaction_id: transaction_id.to_owned(),
        date: test_date(),
        description: String::new(),
        amount: amount.to_owned(),
        bucket_hashtag: None,
        bucket_income_acc: "Savings".to_owned(),
        bucket_withdrawal_acc: "Withdrawal".to_owned(),
        direction: Direction::Deposit,
        suffix: None,
        bucket_override: None,
        savings_account_name: "RDB LONG".to_owned(),
        savings_account_id: "acc-rdb-long".to_owned(),
        savings_account_normalized_name: "rdb_long".to_owned(),
        savings_group_name: None,
        is_initialization: false,
    }
}

/// A bucket-side entry as the engine would have created it for `RDB LONG`:
/// linked via `gl_account_id`, carrying the bucket hashtag and the
/// back-reference hashtag in its description.
pub fn mirrored_entry(id: &str, date: NaiveDate, remote_id: &str) -> LedgerTransaction {
    LedgerTransaction {
        id: id.to_owned(),
        date,
        amount: 100.0,
        description: "#buckets #gl_rdb_long".to_owned(),
        credit_account_id: "b-income".to_owned(),
        debit_account_id: "b-car-long".to_owned(),
        properties: [(props::GL_ACCOUNT_ID.to_owned(), "acc-rdb-long".to_owned())]
            .into_iter()
            .collect(),
        remote_ids: vec![remote_id.to_owned()],
        trashed: false,
        checked: false,
    }
}

fn account(
    id: &str,
    name: &str,
    kind: AccountKind,
    properties: &[(&str, &str)],
    groups: Vec<Group>,
) -> Account {
    Account {
        id: id.to_owned(),
        name: name.to_owned(),
        kind,
        archived: false,
        properties: properties
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect(),
        groups,
    }
}

fn group(id: &str, name: &str, properties: &[(&str, &str)]) -> Group {
    Group {
        id: id.to_owned(),
        name: name.to_owned(),
        properties: properties
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect(),
    }
}

/// Builder for [`MemoryLedger`] fixtures.
#[derive(Default)]
pub struct TestLedgerBuilder {
    books: Vec<Book>,
    accounts: BTreeMap<String, Vec<Account>>,
    seeded_balances: BTreeMap<(String, String), f64>,
    page_size: usize,
    trash_visibility_lag: u32,
}

impl TestLedgerBuilder {
    pub fn new() -> Self {
        Self {
            page_size: 100,
            ..Self::default()
        }
    }

    /// The standard two-book fixture.
    ///
    /// GL book `gl` (collection `col`, `bucket_book_id = bkt`):
    /// `Checking`, `Groceries`, `RDB LONG` (savings), `Holiday Fund` (in
    /// savings group `Savings Goals SHORT`), `Opt Out` (savings:"false" in
    /// the same group), `Old Savings` (savings but archived).
    ///
    /// Bucket book `bkt`: clearing accounts `Savings`/`Withdrawal`, buckets
    /// `Car LONG` 50%, `Car SHORT` 30%, `House LONG` 20%, `Other` (no
    /// percentage).
    #[must_use]
    pub fn standard_books(self) -> Self {
        self.two_books()
            .with_bucket_account("b-car-long", "Car LONG", Some(50.0))
            .with_bucket_account("b-car-short", "Car SHORT", Some(30.0))
            .with_bucket_account("b-house-long", "House LONG", Some(20.0))
            .with_bucket_account("b-other", "Other", None)
    }

    /// The two books with GL accounts and clearing accounts, but no bucket
    /// accounts yet.
    #[must_use]
    pub fn empty_bucket_book(self) -> Self {
        self.two_books()
    }

    fn two_books(mut self) -> Self {
        self.books.push(Book {
            id: "gl".to_owned(),
            name: "General Ledger".to_owned(),
            collection_id: Some("col".to_owned()),
            properties: [(props::BUCKET_BOOK_ID.to_owned(), "bkt".to_owned())]
                .into_iter()
                .collect(),
        });
        self.books.push(Book {
            id: "bkt".to_owned(),
            name: "Buckets".to_owned(),
            collection_id: Some("col".to_owned()),
            properties: BTreeMap::new(),
        });

        let goals = group("g-goals", "Savings Goals SHORT", &[(props::SAVINGS, "true")]);
        let mut archived = account(
            "acc-archived",
            "Old Savings",
            AccountKind::Asset,
            &[(props::SAVINGS, "true")],
            vec![],
        );
        archived.archived = true;
        self.accounts.insert(
            "gl".to_owned(),
            vec![
                account("acc-checking", "Checking", AccountKind::Asset, &[], vec![]),
                account("acc-groceries", "Groceries", AccountKind::Outgoing, &[], vec![]),
                account(
                    "acc-rdb-long",
                    "RDB LONG",
                    AccountKind::Asset,
                    &[(props::SAVINGS, "true")],
                    vec![],
                ),
                account(
                    "acc-holiday",
                    "Holiday Fund",
                    AccountKind::Asset,
                    &[],
                    vec![goals.clone()],
                ),
                account(
                    "acc-optout",
                    "Opt Out",
                    AccountKind::Asset,
                    &[(props::SAVINGS, "false")],
                    vec![goals],
                ),
                archived,
            ],
        );
        self.accounts.insert(
            "bkt".to_owned(),
            vec![
                account("b-income", "Savings", AccountKind::Incoming, &[], vec![]),
                account("b-withdrawal", "Withdrawal", AccountKind::Outgoing, &[], vec![]),
            ],
        );
        self
    }

    /// Appends an asset bucket account, with an optional percentage share.
    #[must_use]
    pub fn with_bucket_account(mut self, id: &str, name: &str, percentage: Option<f64>) -> Self {
        let mut properties: Vec<(String, String)> = Vec::new();
        if let Some(pct) = percentage {
            properties.push((props::PERCENTAGE.to_owned(), format!("{pct}")));
        }
        let props_refs: Vec<(&str, &str)> = properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.accounts
            .get_mut("bkt")
            .unwrap()
            .push(account(id, name, AccountKind::Asset, &props_refs, vec![]));
        self
    }

    /// Appends an asset bucket account that belongs to a named group.
    #[must_use]
    pub fn with_bucket_account_in_group(
        mut self,
        id: &str,
        name: &str,
        percentage: Option<f64>,
        group_name: &str,
    ) -> Self {
        self = self.with_bucket_account(id, name, percentage);
        let bucket = self.accounts.get_mut("bkt").unwrap().last_mut().unwrap();
        bucket
            .groups
            .push(group(&format!("g-{id}"), group_name, &[]));
        self
    }

    /// Removes the clearing accounts from the Bucket book.
    #[must_use]
    pub fn without_clearing_accounts(mut self) -> Self {
        self.accounts
            .get_mut("bkt")
            .unwrap()
            .retain(|a| a.kind == AccountKind::Asset);
        self
    }

    /// Removes a property from the GL book configuration.
    #[must_use]
    pub fn without_gl_property(mut self, key: &str) -> Self {
        let gl = self.books.iter_mut().find(|b| b.id == "gl").unwrap();
        gl.properties.remove(key);
        self
    }

    /// Seeds a base cumulative balance for a named account, on top of
    /// whatever the book's transactions produce.
    #[must_use]
    pub fn with_seeded_balance(mut self, book_id: &str, account_name: &str, amount: f64) -> Self {
        self.seeded_balances
            .insert((book_id.to_owned(), account_name.to_owned()), amount);
        self
    }

    /// Sets the page size of transaction search results.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Makes trashed entries stay visible as live for the given number of
    /// re-fetches, simulating eventual consistency.
    #[must_use]
    pub fn with_trash_visibility_lag(mut self, fetches: u32) -> Self {
        self.trash_visibility_lag = fetches;
        self
    }

    pub fn build(self) -> MemoryLedger {
        MemoryLedger {
            state: Mutex::new(State {
                books: self.books,
                accounts: self.accounts,
                transactions: BTreeMap::new(),
                seeded_balances: self.seeded_balances,
                page_size: self.page_size,
                trash_visibility_lag: self.trash_visibility_lag,
                next_id: 1,
                search_calls: 0,
                fetch_calls: 0,
                trash_calls: 0,
                balance_calls: 0,
                last_query: String::new(),
            }),
        }
    }
}

struct StoredTransaction {
    transaction: LedgerTransaction,
    /// Remaining re-fetches that still report the entry as live after a
    /// trash, per the configured visibility lag.
    pending_trash_fetches: u32,
}

struct State {
    books: Vec<Book>,
    accounts: BTreeMap<String, Vec<Account>>,
    transactions: BTreeMap<String, Vec<StoredTransaction>>,
    seeded_balances: BTreeMap<(String, String), f64>,
    page_size: usize,
    trash_visibility_lag: u32,
    next_id: u64,
    search_calls: usize,
    fetch_calls: usize,
    trash_calls: usize,
    balance_calls: usize,
    last_query: String,
}

/// In-memory ledger platform fake. Every trait call locks the state for its
/// duration; no lock is held across an await point.
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    /// Inserts a pre-built transaction into a book.
    pub fn seed_transaction(&self, book_id: &str, transaction: LedgerTransaction) {
        let mut state = self.state.lock().unwrap();
        state
            .transactions
            .entry(book_id.to_owned())
            .or_default()
            .push(StoredTransaction {
                transaction,
                pending_trash_fetches: 0,
            });
    }

    /// All transactions of a book, trashed included, in creation order.
    pub fn transactions(&self, book_id: &str) -> Vec<LedgerTransaction> {
        let state = self.state.lock().unwrap();
        state
            .transactions
            .get(book_id)
            .map(|txs| txs.iter().map(|s| s.transaction.clone()).collect())
            .unwrap_or_default()
    }

    /// Resolves an account id by exact name; panics when absent.
    pub fn account_id_by_name(&self, book_id: &str, name: &str) -> String {
        let state = self.state.lock().unwrap();
        state.accounts[book_id]
            .iter()
            .find(|a| a.name == name)
            .unwrap_or_else(|| panic!("no account named {name} in {book_id}"))
            .id
            .clone()
    }

    pub fn search_calls(&self) -> usize {
        self.state.lock().unwrap().search_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn trash_calls(&self) -> usize {
        self.state.lock().unwrap().trash_calls
    }

    pub fn balance_calls(&self) -> usize {
        self.state.lock().unwrap().balance_calls
    }

    pub fn last_query(&self) -> String {
        self.state.lock().unwrap().last_query.clone()
    }
}

/// Whether a transaction satisfies the fake's understanding of a query:
/// every token must hold, tokens being `#hashtag` (description contains),
/// `on:YYYY-MM-DD` (exact date) or `gl_account_id:<id>` (property equals).
fn matches_query(transaction: &LedgerTransaction, query: &str) -> bool {
    for token in query.split_whitespace() {
        if let Some(date) = token.strip_prefix("on:") {
            match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                Ok(date) if transaction.date == date => {}
                _ => return false,
            }
        } else if token.starts_with('#') {
            if !transaction.description.contains(token) {
                return false;
            }
        } else if let Some(value) = token.strip_prefix("gl_account_id:") {
            if transaction.properties.get(props::GL_ACCOUNT_ID).map(String::as_str)
                != Some(value)
            {
                return false;
            }
        }
    }
    true
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_book(&self, book_id: &str) -> Result<Book> {
        let state = self.state.lock().unwrap();
        state
            .books
            .iter()
            .find(|b| b.id == book_id)
            .cloned()
            .ok_or_else(|| Error::Ledger {
                message: format!("book {book_id} not found"),
            })
    }

    async fn list_collection_books(&self, collection_id: &str) -> Result<Vec<Book>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .books
            .iter()
            .filter(|b| b.collection_id.as_deref() == Some(collection_id))
            .cloned()
            .collect())
    }

    async fn list_accounts(
        &self,
        book_id: &str,
        kind: Option<AccountKind>,
    ) -> Result<Vec<Account>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .get(book_id)
            .map(|accounts| {
                accounts
                    .iter()
                    .filter(|a| kind.is_none_or(|k| a.kind == k))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_account(&self, book_id: &str, account_id: &str) -> Result<Option<Account>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .get(book_id)
            .and_then(|accounts| accounts.iter().find(|a| a.id == account_id))
            .cloned())
    }

    async fn find_account_by_name(&self, book_id: &str, name: &str) -> Result<Option<Account>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .get(book_id)
            .and_then(|accounts| accounts.iter().find(|a| a.name == name))
            .cloned())
    }

    async fn search_transactions(
        &self,
        book_id: &str,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionPage> {
        let mut state = self.state.lock().unwrap();
        state.search_calls += 1;
        state.last_query = query.to_owned();

        let matching: Vec<LedgerTransaction> = state
            .transactions
            .get(book_id)
            .map(|txs| {
                txs.iter()
                    .map(|s| &s.transaction)
                    .filter(|t| !t.trashed && matches_query(t, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let start: usize = cursor.map(|c| c.parse().unwrap_or(0)).unwrap_or(0);
        let end = (start + state.page_size).min(matching.len());
        let page: Vec<LedgerTransaction> = matching[start.min(end)..end].to_vec();
        let cursor = if end < matching.len() {
            Some(end.to_string())
        } else {
            None
        };
        Ok(TransactionPage {
            transactions: page,
            cursor,
        })
    }

    async fn create_transaction(
        &self,
        book_id: &str,
        transaction: NewTransaction,
    ) -> Result<LedgerTransaction> {
        let mut state = self.state.lock().unwrap();
        let id = format!("tx-{}", state.next_id);
        state.next_id += 1;
        let created = LedgerTransaction {
            id,
            date: transaction.date,
            amount: transaction.amount,
            description: transaction.description,
            credit_account_id: transaction.credit_account_id,
            debit_account_id: transaction.debit_account_id,
            properties: transaction.properties,
            remote_ids: transaction.remote_ids,
            trashed: false,
            checked: false,
        };
        state
            .transactions
            .entry(book_id.to_owned())
            .or_default()
            .push(StoredTransaction {
                transaction: created.clone(),
                pending_trash_fetches: 0,
            });
        Ok(created)
    }

    async fn trash_transactions(
        &self,
        book_id: &str,
        ids: &[String],
        uncheck: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.trash_calls += 1;
        let lag = state.trash_visibility_lag;
        if let Some(txs) = state.transactions.get_mut(book_id) {
            for stored in txs.iter_mut() {
                if ids.contains(&stored.transaction.id) {
                    stored.transaction.trashed = true;
                    if uncheck {
                        stored.transaction.checked = false;
                    }
                    stored.pending_trash_fetches = lag;
                }
            }
        }
        Ok(())
    }

    async fn check_transactions(&self, book_id: &str, ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(txs) = state.transactions.get_mut(book_id) {
            for stored in txs.iter_mut() {
                if ids.contains(&stored.transaction.id) {
                    stored.transaction.checked = true;
                }
            }
        }
        Ok(())
    }

    async fn get_transaction(
        &self,
        book_id: &str,
        transaction_id: &str,
    ) -> Result<Option<LedgerTransaction>> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        let Some(txs) = state.transactions.get_mut(book_id) else {
            return Ok(None);
        };
        let Some(stored) = txs.iter_mut().find(|s| s.transaction.id == transaction_id) else {
            return Ok(None);
        };
        if stored.transaction.trashed && stored.pending_trash_fetches > 0 {
            stored.pending_trash_fetches -= 1;
            let mut stale = stored.transaction.clone();
            stale.trashed = false;
            return Ok(Some(stale));
        }
        Ok(Some(stored.transaction.clone()))
    }

    async fn balances(&self, book_id: &str, query: &str) -> Result<Vec<AccountBalance>> {
        let mut state = self.state.lock().unwrap();
        state.balance_calls += 1;

        let names: Vec<String> = query
            .split(" or ")
            .filter_map(|part| {
                part.trim()
                    .strip_prefix("account:'")
                    .and_then(|rest| rest.strip_suffix('\''))
                    .map(str::to_owned)
            })
            .collect();

        let mut report = Vec::new();
        for name in names {
            let seeded = state
                .seeded_balances
                .get(&(book_id.to_owned(), name.clone()))
                .copied()
                .unwrap_or(0.0);
            let account_id = state
                .accounts
                .get(book_id)
                .and_then(|accounts| accounts.iter().find(|a| a.name == name))
                .map(|a| a.id.clone());
            let derived: f64 = match account_id {
                Some(id) => state
                    .transactions
                    .get(book_id)
                    .map(|txs| {
                        txs.iter()
                            .map(|s| &s.transaction)
                            .filter(|t| !t.trashed)
                            .map(|t| {
                                // Asset-style balance: debits increase,
                                // credits decrease.
                                if t.debit_account_id == id {
                                    t.amount
                                } else if t.credit_account_id == id {
                                    -t.amount
                                } else {
                                    0.0
                                }
                            })
                            .sum()
                    })
                    .unwrap_or(0.0),
                None => 0.0,
            };
            report.push(AccountBalance {
                account_name: name,
                cumulative_balance: seeded + derived,
            });
        }
        Ok(report)
    }
}
