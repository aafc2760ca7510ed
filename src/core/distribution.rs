//! Distribution strategies - mirror one savings movement into bucket
//! accounts.
//!
//! Three mutually exclusive strategies exist, selected by the context:
//! full distribution for unqualified events, suffix-filtered distribution
//! when the context carries a routing suffix, and override distribution when
//! the source transaction names its targets explicitly. All three share the
//! same entry construction: one bucket-side transaction per target, the
//! clearing account as counter-leg, a `gl_account_id` back-link property and
//! a collision-resistant remote identifier. Entries are persisted as a
//! sequential loop of independent creates; a partial failure is surfaced
//! as-is and is not rolled back.

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    core::{
        detector::{Direction, SavingsContext},
        percentages::account_percentage,
        suffix::{extract_suffix, normalize_name},
    },
    errors::{Error, Result},
    ledger::{props, Account, AccountKind, LedgerClient, LedgerTransaction, NewTransaction},
};

/// Outcome of a distribution strategy call.
#[derive(Debug, Clone)]
pub enum Distribution {
    /// Entries were created. Partial failures never reach this variant.
    Completed(DistributionResult),
    /// The strategy did not apply to this context; nothing was created.
    Skipped,
}

/// Summary of a completed distribution.
#[derive(Debug, Clone)]
pub struct DistributionResult {
    pub transaction_count: usize,
    pub total_distributed: f64,
    /// The created bucket-side entries, in creation order.
    pub transactions: Vec<LedgerTransaction>,
}

/// Full distribution: every active asset bucket account carrying a
/// `percentage` property receives `amount * percentage / 100`.
///
/// Only ever runs for unqualified events: a context carrying a suffix or an
/// override is skipped without touching the book.
pub async fn distribute_full(
    client: &dyn LedgerClient,
    context: &SavingsContext,
) -> Result<Distribution> {
    if context.suffix.is_some() || context.bucket_override.is_some() {
        debug!(
            transaction_id = %context.transaction_id,
            "context is qualified, full distribution does not apply"
        );
        return Ok(Distribution::Skipped);
    }

    let total = parse_amount(context)?;
    let targets: Vec<(Account, f64)> = bucket_accounts(client, context)
        .await?
        .into_iter()
        .filter_map(|account| {
            let pct = account_percentage(&account)?;
            Some((account, pct))
        })
        .collect();

    create_entries(client, context, targets, total)
        .await
        .map(Distribution::Completed)
}

/// Suffix-filtered distribution: only bucket accounts whose own name or any
/// of their groups' names carries the context suffix participate.
///
/// The matched subset's percentages are renormalized to sum to 100; the
/// rounding residue is folded into the first matched account so the total
/// distributed reconciles exactly. An empty target set is a hard
/// configuration error naming the suffix.
pub async fn distribute_by_suffix(
    client: &dyn LedgerClient,
    context: &SavingsContext,
) -> Result<Distribution> {
    let Some(suffix) = context.suffix.as_deref() else {
        return Err(Error::Config {
            message: "suffix distribution called without a suffix".to_owned(),
        });
    };

    let total = parse_amount(context)?;
    let mut targets: Vec<(Account, f64)> = bucket_accounts(client, context)
        .await?
        .into_iter()
        .filter(|account| matches_suffix(account, suffix))
        .filter_map(|account| {
            let pct = account_percentage(&account)?;
            Some((account, pct))
        })
        .collect();

    if targets.is_empty() {
        return Err(Error::NoBucketsForSuffix {
            suffix: suffix.to_owned(),
        });
    }

    renormalize(&mut targets);
    create_entries(client, context, targets, total)
        .await
        .map(Distribution::Completed)
}

/// Override distribution: the accounts named in the comma-separated
/// `bucket` property receive equal shares, ignoring configured percentages.
///
/// Any name that resolves to no account fails the whole distribution, with
/// every missing name listed in the error.
pub async fn distribute_override(
    client: &dyn LedgerClient,
    context: &SavingsContext,
) -> Result<Distribution> {
    let Some(raw) = context.bucket_override.as_deref() else {
        return Err(Error::Config {
            message: "override distribution called without an override".to_owned(),
        });
    };
    let names: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Err(Error::Config {
            message: "bucket override names no accounts".to_owned(),
        });
    }

    let total = parse_amount(context)?;
    let mut found = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match client.find_account_by_name(&context.bucket_book_id, name).await? {
            Some(account) => found.push(account),
            None => missing.push(name),
        }
    }
    if !missing.is_empty() {
        return Err(Error::OverrideAccountsMissing {
            names: missing.join(", "),
        });
    }

    // One-off manual instruction: equal split, not a policy change.
    #[allow(clippy::cast_precision_loss)]
    let share = 100.0 / found.len() as f64;
    let targets: Vec<(Account, f64)> = found.into_iter().map(|a| (a, share)).collect();

    create_entries(client, context, targets, total)
        .await
        .map(Distribution::Completed)
}

/// Active asset accounts of the Bucket book.
async fn bucket_accounts(
    client: &dyn LedgerClient,
    context: &SavingsContext,
) -> Result<Vec<Account>> {
    let accounts = client
        .list_accounts(&context.bucket_book_id, Some(AccountKind::Asset))
        .await?;
    Ok(accounts.into_iter().filter(|a| !a.archived).collect())
}

/// Whether a bucket account belongs to the suffix partition, by its own
/// name or any of its groups' names.
fn matches_suffix(account: &Account, suffix: &str) -> bool {
    extract_suffix(&account.name) == Some(suffix)
        || account
            .groups
            .iter()
            .any(|g| extract_suffix(&g.name) == Some(suffix))
}

/// Renormalizes matched percentages to sum to 100, folding the rounding
/// residue into the first matched account. The residue is within 1e-4 in
/// magnitude under correct arithmetic; folding it keeps the distributed
/// total reconciling exactly against the source amount.
fn renormalize(targets: &mut [(Account, f64)]) {
    let sum: f64 = targets.iter().map(|(_, pct)| pct).sum();
    if sum == 0.0 {
        return;
    }
    for (_, pct) in targets.iter_mut() {
        *pct = *pct / sum * 100.0;
    }
    let renormalized_sum: f64 = targets.iter().map(|(_, pct)| pct).sum();
    let residue = 100.0 - renormalized_sum;
    if let Some((_, first)) = targets.first_mut() {
        *first += residue;
    }
}

/// Shared entry construction and persistence for all three strategies.
async fn create_entries(
    client: &dyn LedgerClient,
    context: &SavingsContext,
    targets: Vec<(Account, f64)>,
    total: f64,
) -> Result<DistributionResult> {
    let income = clearing_account(client, context, &context.bucket_income_acc).await?;
    let withdrawal = clearing_account(client, context, &context.bucket_withdrawal_acc).await?;

    let description = entry_description(context);
    let mut transactions = Vec::with_capacity(targets.len());
    let mut total_distributed = 0.0;

    for (account, pct) in targets {
        let amount = total * pct / 100.0;
        let (credit_account_id, debit_account_id) = match context.direction {
            Direction::Deposit => (income.id.clone(), account.id.clone()),
            Direction::Withdrawal => (account.id.clone(), withdrawal.id.clone()),
        };

        let new = NewTransaction {
            date: context.date,
            amount,
            description: description.clone(),
            credit_account_id,
            debit_account_id,
            properties: [(
                props::GL_ACCOUNT_ID.to_owned(),
                context.savings_account_id.clone(),
            )]
            .into_iter()
            .collect(),
            remote_ids: vec![remote_id(context, &account.name)],
        };

        let created = client.create_transaction(&context.bucket_book_id, new).await?;
        total_distributed += amount;
        transactions.push(created);
    }

    info!(
        transaction_id = %context.transaction_id,
        count = transactions.len(),
        total_distributed,
        "distribution completed"
    );
    Ok(DistributionResult {
        transaction_count: transactions.len(),
        total_distributed,
        transactions,
    })
}

/// Resolves a clearing account by exact name in the Bucket book.
async fn clearing_account(
    client: &dyn LedgerClient,
    context: &SavingsContext,
    name: &str,
) -> Result<Account> {
    client
        .find_account_by_name(&context.bucket_book_id, name)
        .await?
        .ok_or_else(|| Error::ClearingAccountNotFound {
            name: name.to_owned(),
        })
}

/// Entry description: base description, optional bucket hashtag, and the
/// back-reference hashtag naming the normalized savings account.
fn entry_description(context: &SavingsContext) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);
    let base = context.description.trim();
    if !base.is_empty() {
        parts.push(base.to_owned());
    }
    if let Some(tag) = context.bucket_hashtag.as_deref() {
        parts.push(hashtag_token(tag));
    }
    parts.push(format!("#gl_{}", context.savings_account_normalized_name));
    parts.join(" ")
}

/// Normalizes a configured hashtag to a `#`-prefixed token.
fn hashtag_token(tag: &str) -> String {
    let tag = tag.trim();
    if tag.starts_with('#') {
        tag.to_owned()
    } else {
        format!("#{tag}")
    }
}

/// Remote identifier for one bucket-side entry:
/// `{source_id}_{normalized_bucket_name}_{millis}`, `init_`-prefixed for
/// initialization entries. The timestamp avoids identifier collisions
/// across repeated distribution/cleanup cycles for the same source event.
fn remote_id(context: &SavingsContext, bucket_account_name: &str) -> String {
    let prefix = if context.is_initialization { "init_" } else { "" };
    format!(
        "{prefix}{}_{}_{}",
        context.transaction_id,
        normalize_name(bucket_account_name),
        Utc::now().timestamp_millis()
    )
}

/// Parses the context's decimal-string amount.
fn parse_amount(context: &SavingsContext) -> Result<f64> {
    let parsed = context.amount.trim().parse::<f64>().ok().filter(|a| a.is_finite());
    parsed.ok_or_else(|| Error::InvalidAmount {
        value: context.amount.clone(),
    })
}
