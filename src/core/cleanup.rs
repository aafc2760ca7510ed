//! Cleanup of previously mirrored entries, with eventual-consistency
//! verification.
//!
//! Redistribution after an edit must never race its own stale entries, so
//! every redistribution is preceded by a cleanup pass: match the old
//! entries, trash them in one batch, then confirm the remote store reflects
//! the deletion before anything new is created. The remote store is
//! eventually consistent; verification retries with a fixed delay and, once
//! the budget is exhausted, logs the stragglers instead of failing the
//! caller.

use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    core::matcher,
    errors::Result,
    ledger::{LedgerClient, LedgerTransaction},
};

/// Retry policy for trash verification.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_millis(500),
        }
    }
}

/// Soft-deletes the given entries in one batched call, un-checking any that
/// were previously reconciled. Returns the number of entries trashed; a
/// no-op on an empty list.
pub async fn trash_entries(
    client: &dyn LedgerClient,
    book_id: &str,
    entries: &[LedgerTransaction],
) -> Result<usize> {
    if entries.is_empty() {
        return Ok(0);
    }
    let ids: Vec<String> = entries.iter().map(|t| t.id.clone()).collect();
    client.trash_transactions(book_id, &ids, true).await?;
    info!(count = ids.len(), "trashed bucket entries");
    Ok(ids.len())
}

/// Confirms that trashed entries are visible as trashed, re-fetching each
/// by id. Entries not yet reflecting the deletion are retried as a batch
/// after a fixed delay, up to `max_retries` rounds. Exhausting the budget
/// logs the remaining entries and returns `Ok` - eventual consistency is
/// acknowledged, not escalated.
pub async fn verify_trashed(
    client: &dyn LedgerClient,
    book_id: &str,
    entries: &[LedgerTransaction],
    options: VerifyOptions,
) -> Result<()> {
    let mut pending: Vec<String> = entries.iter().map(|t| t.id.clone()).collect();
    if pending.is_empty() {
        return Ok(());
    }

    for attempt in 1..=options.max_retries {
        let mut still_visible = Vec::new();
        for id in &pending {
            match client.get_transaction(book_id, id).await? {
                Some(transaction) if !transaction.trashed => still_visible.push(id.clone()),
                // Trashed, or gone entirely: deletion is reflected.
                _ => {}
            }
        }
        if still_visible.is_empty() {
            debug!(attempt, "all trashed entries verified");
            return Ok(());
        }
        pending = still_visible;
        if attempt < options.max_retries {
            debug!(attempt, pending = pending.len(), "deletion not yet visible, retrying");
            sleep(options.delay).await;
        }
    }

    warn!(
        remaining = pending.len(),
        ids = ?pending,
        "entries still not visible as trashed after retry budget"
    );
    Ok(())
}

/// Removes all entries previously mirrored for one GL transaction:
/// matcher + batched trash + verification, in that order. Returns the
/// number of entries removed.
pub async fn cleanup_by_gl_id(
    client: &dyn LedgerClient,
    book_id: &str,
    hashtag: Option<&str>,
    date: NaiveDate,
    gl_transaction_id: &str,
    expected_count: Option<usize>,
    options: VerifyOptions,
) -> Result<usize> {
    let entries = matcher::find_by_gl_id(
        client,
        book_id,
        hashtag,
        date,
        gl_transaction_id,
        expected_count,
    )
    .await?;
    let count = trash_entries(client, book_id, &entries).await?;
    verify_trashed(client, book_id, &entries, options).await?;
    Ok(count)
}

/// Removes all entries ever mirrored for one GL account, used for
/// account-lifecycle transitions (archive, delete, savings flag removed).
pub async fn cleanup_by_gl_account_id(
    client: &dyn LedgerClient,
    book_id: &str,
    gl_account_id: &str,
    options: VerifyOptions,
) -> Result<usize> {
    let entries = matcher::find_by_gl_account_id(client, book_id, gl_account_id).await?;
    let count = trash_entries(client, book_id, &entries).await?;
    verify_trashed(client, book_id, &entries, options).await?;
    Ok(count)
}
