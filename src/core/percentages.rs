//! Bucket percentage configuration invariant.
//!
//! Distribution is only permitted while the `percentage` shares of all
//! bucket accounts sum to exactly 100. This is a live invariant owned by the
//! operator: it is re-checked before every distribution, never cached, and
//! the check is exact rather than tolerance-based because configured shares
//! are not measured quantities.

use tracing::warn;

use crate::{
    errors::{Error, Result},
    ledger::{props, Account, AccountKind, LedgerClient},
};

/// Result of a percentage configuration check.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentageValidation {
    pub is_valid: bool,
    pub total_percentage: f64,
    /// Number of accounts that contributed a percentage to the sum.
    pub account_count: usize,
}

impl PercentageValidation {
    /// Converts an invalid check into a configuration error, for callers
    /// that want to abort distribution with a structured failure.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(Error::PercentagesNotHundred {
                total: self.total_percentage,
            })
        }
    }
}

/// Sums the `percentage` property over all active asset accounts of the
/// Bucket book. Accounts without the property are ignored; accounts with an
/// unparsable value are logged and ignored.
pub async fn validate_percentages(
    client: &dyn LedgerClient,
    bucket_book_id: &str,
) -> Result<PercentageValidation> {
    let accounts = client
        .list_accounts(bucket_book_id, Some(AccountKind::Asset))
        .await?;

    let mut total = 0.0;
    let mut count = 0;
    for account in &accounts {
        if account.archived {
            continue;
        }
        if let Some(pct) = account_percentage(account) {
            total += pct;
            count += 1;
        }
    }

    #[allow(clippy::float_cmp)] // exact equality is the contract here
    let is_valid = total == 100.0;
    if !is_valid {
        warn!(total, count, "bucket percentages do not sum to 100");
    }
    Ok(PercentageValidation {
        is_valid,
        total_percentage: total,
        account_count: count,
    })
}

/// Parses the `percentage` property of an account, logging unparsable
/// values once and treating them as absent.
#[must_use]
pub fn account_percentage(account: &Account) -> Option<f64> {
    let raw = account.property(props::PERCENTAGE)?;
    match raw.trim().parse::<f64>() {
        Ok(pct) => Some(pct),
        Err(_) => {
            warn!(account = %account.name, value = raw, "unparsable percentage property");
            None
        }
    }
}
