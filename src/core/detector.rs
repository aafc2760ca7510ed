//! Savings detection business logic.
//!
//! Inspects one ledger event and decides whether it concerns a savings
//! account, producing a normalized [`SavingsContext`] that carries everything
//! downstream stages need without re-querying the event source. Detection
//! non-matches are not errors: they yield [`Detection::NotSavings`] and the
//! caller no-ops.

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    core::suffix::{extract_suffix, normalize_name},
    errors::Result,
    events::EventTransaction,
    ledger::{props, Account, Book, Group, LedgerClient, DEFAULT_INCOME_ACC, DEFAULT_WITHDRAWAL_ACC},
};

/// Direction of a savings movement relative to the GL savings account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Money moved into the savings account; buckets are debited.
    Deposit,
    /// Money moved out of the savings account; buckets are credited.
    Withdrawal,
}

/// Outcome of savings detection. The context is only reachable through the
/// `Savings` case, so callers cannot read routing data without having
/// checked relevance first.
#[derive(Debug, Clone)]
pub enum Detection {
    /// The event does not concern a savings account; the caller no-ops.
    NotSavings,
    /// The event is savings-relevant; distribute using the carried context.
    Savings(Box<SavingsContext>),
}

/// Immutable value object built once per event.
///
/// Invariant: at most one of `suffix` / `bucket_override` is set. When the
/// transaction carries an explicit override, suffix derivation is skipped
/// entirely rather than computed and ignored.
#[derive(Debug, Clone)]
pub struct SavingsContext {
    /// Id of the Bucket book all entries are created in.
    pub bucket_book_id: String,
    /// Source transaction id, or the account id for lifecycle events.
    pub transaction_id: String,
    pub date: chrono::NaiveDate,
    pub description: String,
    /// Decimal string as delivered by the platform; parsed at distribution.
    pub amount: String,
    /// Optional label appended to generated descriptions.
    pub bucket_hashtag: Option<String>,
    /// Name of the income clearing account in the Bucket book.
    pub bucket_income_acc: String,
    /// Name of the withdrawal clearing account in the Bucket book.
    pub bucket_withdrawal_acc: String,
    pub direction: Direction,
    /// Routing tag derived from account/group names; `None` when an
    /// override is present.
    pub suffix: Option<String>,
    /// Explicit comma-separated bucket account names; always wins over
    /// suffix routing.
    pub bucket_override: Option<String>,
    pub savings_account_name: String,
    pub savings_account_id: String,
    pub savings_account_normalized_name: String,
    /// Set only if detection occurred via a group rather than the account.
    pub savings_group_name: Option<String>,
    /// Distinguishes synthetic balance-seeding events from real mirroring.
    pub is_initialization: bool,
}

/// How a savings account was identified for one side of the transaction.
struct SavingsMatch {
    account: Account,
    direction: Direction,
    /// The group that carried the savings flag, if detection was group-based.
    group: Option<Group>,
}

/// Inspects a transaction event against the GL book configuration and
/// produces a [`Detection`].
///
/// Resolution order follows the operational contract: the debited account is
/// checked before the credited one, a direct `savings` property beats group
/// membership, and an explicit `savings:"false"` on an account suppresses
/// the group search for that account.
pub async fn detect_savings(
    client: &dyn LedgerClient,
    gl_book_id: &str,
    transaction: &EventTransaction,
) -> Result<Detection> {
    let gl_book = client.get_book(gl_book_id).await?;
    let Some(bucket_book) = resolve_bucket_book(client, &gl_book).await? else {
        return Ok(Detection::NotSavings);
    };

    let debit = client.get_account(gl_book_id, &transaction.debit_account_id).await?;
    let credit = client.get_account(gl_book_id, &transaction.credit_account_id).await?;

    let Some(matched) = match_savings_account(debit, credit) else {
        debug!(transaction_id = %transaction.id, "no savings account involved");
        return Ok(Detection::NotSavings);
    };

    let bucket_override = transaction
        .properties
        .get(props::BUCKET_OVERRIDE)
        .filter(|v| !v.is_empty())
        .cloned();
    // Override precedence: when present, suffix derivation is skipped
    // entirely, not merely ignored later.
    let suffix = if bucket_override.is_some() {
        None
    } else {
        derive_suffix(&matched)
    };

    let context = SavingsContext {
        bucket_book_id: bucket_book.id.clone(),
        transaction_id: transaction.id.clone(),
        date: transaction.date,
        description: transaction.description.clone(),
        amount: transaction.amount.clone(),
        bucket_hashtag: bucket_book.property(props::BUCKET_HASHTAG).map(str::to_owned),
        bucket_income_acc: bucket_book
            .property(props::BUCKET_INCOME_ACC)
            .unwrap_or(DEFAULT_INCOME_ACC)
            .to_owned(),
        bucket_withdrawal_acc: bucket_book
            .property(props::BUCKET_WITHDRAWAL_ACC)
            .unwrap_or(DEFAULT_WITHDRAWAL_ACC)
            .to_owned(),
        direction: matched.direction,
        suffix,
        bucket_override,
        savings_account_name: matched.account.name.clone(),
        savings_account_id: matched.account.id.clone(),
        savings_account_normalized_name: normalize_name(&matched.account.name),
        savings_group_name: matched.group.as_ref().map(|g| g.name.clone()),
        is_initialization: false,
    };

    info!(
        transaction_id = %context.transaction_id,
        savings_account = %context.savings_account_name,
        direction = ?context.direction,
        suffix = ?context.suffix,
        "savings transaction detected"
    );
    Ok(Detection::Savings(Box::new(context)))
}

/// Builds a synthetic balance-seeding context for an account-lifecycle
/// event (unarchive, savings flag turned on). The account id doubles as the
/// source identifier and the amount is the account's current cumulative
/// balance.
pub async fn initialization_context(
    client: &dyn LedgerClient,
    gl_book_id: &str,
    account_id: &str,
) -> Result<Detection> {
    let gl_book = client.get_book(gl_book_id).await?;
    let Some(bucket_book) = resolve_bucket_book(client, &gl_book).await? else {
        return Ok(Detection::NotSavings);
    };

    let Some(account) = client.get_account(gl_book_id, account_id).await? else {
        return Ok(Detection::NotSavings);
    };
    let Some(matched) = match_savings_account(Some(account), None) else {
        return Ok(Detection::NotSavings);
    };

    let balance = account_balance(client, gl_book_id, &matched.account.name).await?;
    if balance == 0.0 {
        debug!(account = %matched.account.name, "zero balance, nothing to seed");
        return Ok(Detection::NotSavings);
    }
    // A negative cumulative balance seeds as a withdrawal of its magnitude.
    let direction = if balance < 0.0 {
        Direction::Withdrawal
    } else {
        Direction::Deposit
    };

    let suffix = derive_suffix(&matched);
    let context = SavingsContext {
        bucket_book_id: bucket_book.id.clone(),
        transaction_id: matched.account.id.clone(),
        date: Utc::now().date_naive(),
        description: format!("Savings initialization: {}", matched.account.name),
        amount: format!("{:.2}", balance.abs()),
        bucket_hashtag: bucket_book.property(props::BUCKET_HASHTAG).map(str::to_owned),
        bucket_income_acc: bucket_book
            .property(props::BUCKET_INCOME_ACC)
            .unwrap_or(DEFAULT_INCOME_ACC)
            .to_owned(),
        bucket_withdrawal_acc: bucket_book
            .property(props::BUCKET_WITHDRAWAL_ACC)
            .unwrap_or(DEFAULT_WITHDRAWAL_ACC)
            .to_owned(),
        direction,
        suffix,
        bucket_override: None,
        savings_account_name: matched.account.name.clone(),
        savings_account_id: matched.account.id.clone(),
        savings_account_normalized_name: normalize_name(&matched.account.name),
        savings_group_name: matched.group.as_ref().map(|g| g.name.clone()),
        is_initialization: true,
    };

    info!(
        account = %context.savings_account_name,
        amount = %context.amount,
        direction = ?context.direction,
        "initialization context built"
    );
    Ok(Detection::Savings(Box::new(context)))
}

/// Resolves the Bucket book configured on the GL book from the sibling
/// books of the same collection. `None` when the configuration is absent or
/// the book cannot be found.
async fn resolve_bucket_book(
    client: &dyn LedgerClient,
    gl_book: &Book,
) -> Result<Option<Book>> {
    let Some(bucket_book_id) = gl_book.property(props::BUCKET_BOOK_ID) else {
        debug!(book = %gl_book.name, "no bucket_book_id configured");
        return Ok(None);
    };
    let Some(collection_id) = gl_book.collection_id.as_deref() else {
        debug!(book = %gl_book.name, "book belongs to no collection");
        return Ok(None);
    };
    let siblings = client.list_collection_books(collection_id).await?;
    Ok(siblings.into_iter().find(|b| b.id == bucket_book_id))
}

/// Finds the savings account among the two sides of a transaction.
///
/// Direct `savings:"true"` on the debited account wins (deposit), then on
/// the credited account (withdrawal). Only if neither side carries the
/// property explicitly are groups searched, debited account first; an
/// explicit `savings:"false"` excludes that account's groups. Archived
/// accounts never match.
fn match_savings_account(
    debit: Option<Account>,
    credit: Option<Account>,
) -> Option<SavingsMatch> {
    let sides = [(debit, Direction::Deposit), (credit, Direction::Withdrawal)];

    for (account, direction) in &sides {
        let Some(account) = account else { continue };
        if account.archived {
            continue;
        }
        if account.property(props::SAVINGS) == Some("true") {
            return Some(SavingsMatch {
                account: account.clone(),
                direction: *direction,
                group: None,
            });
        }
    }

    for (account, direction) in &sides {
        let Some(account) = account else { continue };
        if account.archived || account.property(props::SAVINGS) == Some("false") {
            continue;
        }
        if let Some(group) = account
            .groups
            .iter()
            .find(|g| g.property(props::SAVINGS) == Some("true"))
        {
            return Some(SavingsMatch {
                account: account.clone(),
                direction: *direction,
                group: Some(group.clone()),
            });
        }
    }

    None
}

/// Derives the routing suffix for a matched savings account: the matching
/// group's name first (if detection was group-based), then the account's own
/// name, then each of the account's groups in listing order.
fn derive_suffix(matched: &SavingsMatch) -> Option<String> {
    matched
        .group
        .as_ref()
        .and_then(|g| extract_suffix(&g.name))
        .or_else(|| extract_suffix(&matched.account.name))
        .or_else(|| {
            matched
                .account
                .groups
                .iter()
                .find_map(|g| extract_suffix(&g.name))
        })
        .map(str::to_owned)
}

/// Cumulative balance of a single named account via the balance-report
/// capability.
async fn account_balance(
    client: &dyn LedgerClient,
    book_id: &str,
    account_name: &str,
) -> Result<f64> {
    let query = format!("account:'{account_name}'");
    let balances = client.balances(book_id, &query).await?;
    Ok(balances.iter().map(|b| b.cumulative_balance).sum())
}
