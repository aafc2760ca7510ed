//! Balance reconciliation between the GL and Bucket books.
//!
//! The GL book is authoritative: the sum of all savings account balances
//! must equal the sum of all bucket account balances, within a fixed
//! absolute tolerance that accommodates display rounding. Each side is
//! fetched with a single combined balance query rather than one query per
//! account, to bound API call count. A mismatch is not an error - the
//! caller leaves entries unchecked for manual review instead of marking
//! them reconciled.

use tracing::{info, warn};

use crate::{
    errors::Result,
    ledger::{props, AccountKind, LedgerClient, LedgerTransaction},
};

/// Fixed absolute tolerance for balance comparison.
pub const BALANCE_TOLERANCE: f64 = 0.01;

/// Result of a cross-book balance comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    pub is_balanced: bool,
    pub gl_total: f64,
    pub bucket_total: f64,
    /// `gl_total - bucket_total`, sign preserved.
    pub difference: f64,
}

/// Compares aggregate balances: GL accounts flagged `savings:"true"`
/// (archived excluded) against Bucket-book asset accounts carrying a
/// `percentage` property.
pub async fn validate_balances(
    client: &dyn LedgerClient,
    gl_book_id: &str,
    bucket_book_id: &str,
    tolerance: f64,
) -> Result<BalanceReport> {
    let gl_names: Vec<String> = client
        .list_accounts(gl_book_id, None)
        .await?
        .into_iter()
        .filter(|a| !a.archived && a.property(props::SAVINGS) == Some("true"))
        .map(|a| a.name)
        .collect();

    let bucket_names: Vec<String> = client
        .list_accounts(bucket_book_id, Some(AccountKind::Asset))
        .await?
        .into_iter()
        .filter(|a| !a.archived && a.property(props::PERCENTAGE).is_some())
        .map(|a| a.name)
        .collect();

    let gl_total = combined_balance(client, gl_book_id, &gl_names).await?;
    let bucket_total = combined_balance(client, bucket_book_id, &bucket_names).await?;
    let difference = gl_total - bucket_total;
    let is_balanced = difference.abs() < tolerance;

    if is_balanced {
        info!(gl_total, bucket_total, "books are balanced");
    } else {
        warn!(gl_total, bucket_total, difference, "books are out of balance");
    }
    Ok(BalanceReport {
        is_balanced,
        gl_total,
        bucket_total,
        difference,
    })
}

/// Marks entries as checked (reconciled) in one batched call. Used by the
/// caller only after a balanced report; returns the number marked.
pub async fn mark_checked(
    client: &dyn LedgerClient,
    book_id: &str,
    entries: &[LedgerTransaction],
) -> Result<usize> {
    if entries.is_empty() {
        return Ok(0);
    }
    let ids: Vec<String> = entries.iter().map(|t| t.id.clone()).collect();
    client.check_transactions(book_id, &ids).await?;
    info!(count = ids.len(), "marked entries as reconciled");
    Ok(ids.len())
}

/// Sum of cumulative balances of the named accounts, fetched with one
/// OR-query over all names. An empty name list yields zero without a
/// remote call.
async fn combined_balance(
    client: &dyn LedgerClient,
    book_id: &str,
    names: &[String],
) -> Result<f64> {
    if names.is_empty() {
        return Ok(0.0);
    }
    let query = names
        .iter()
        .map(|n| format!("account:'{n}'"))
        .collect::<Vec<_>>()
        .join(" or ");
    let balances = client.balances(book_id, &query).await?;
    Ok(balances.iter().map(|b| b.cumulative_balance).sum())
}
