//! Lookup of previously mirrored bucket-side entries.
//!
//! Entries are located through the platform's paginated transaction search.
//! For transaction-scoped lookups the query is narrowed by the bucket
//! hashtag and an exact-date filter so the remote store returns a small
//! page rather than scanning the whole book; matching itself happens
//! client-side on the remote identifier prefix. Account-scoped lookups use
//! the `gl_account_id` linking property with no date bound, since a savings
//! account may have produced entries across its entire lifetime.

use chrono::NaiveDate;
use tracing::debug;

use crate::{
    errors::Result,
    ledger::{props, LedgerClient, LedgerTransaction},
};

/// Finds all entries in the Bucket book created for one GL transaction.
///
/// An entry matches when any of its remote identifiers starts with
/// `"{gl_transaction_id}_"`; it contributes at most once even if several of
/// its identifiers qualify. Pages are fetched until the cursor is exhausted,
/// or early once `expected_count` matches have been found - safe because
/// the caller supplies an authoritative count (e.g. the number of active
/// bucket accounts).
pub async fn find_by_gl_id(
    client: &dyn LedgerClient,
    book_id: &str,
    hashtag: Option<&str>,
    date: NaiveDate,
    gl_transaction_id: &str,
    expected_count: Option<usize>,
) -> Result<Vec<LedgerTransaction>> {
    let mut query = String::new();
    if let Some(tag) = hashtag {
        let tag = tag.trim().trim_start_matches('#');
        if !tag.is_empty() {
            query.push('#');
            query.push_str(tag);
            query.push(' ');
        }
    }
    query.push_str(&format!("on:{}", date.format("%Y-%m-%d")));

    let prefix = format!("{gl_transaction_id}_");
    let mut matches = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client
            .search_transactions(book_id, &query, cursor.as_deref())
            .await?;
        for transaction in page.transactions {
            if transaction.remote_ids.iter().any(|id| id.starts_with(&prefix)) {
                matches.push(transaction);
                if let Some(expected) = expected_count {
                    if matches.len() >= expected {
                        debug!(
                            gl_transaction_id,
                            expected, "expected count reached, stopping pagination"
                        );
                        return Ok(matches);
                    }
                }
            }
        }
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(gl_transaction_id, count = matches.len(), "matched bucket entries");
    Ok(matches)
}

/// Finds all entries linked to one GL account via the `gl_account_id`
/// property, across the account's whole lifetime.
pub async fn find_by_gl_account_id(
    client: &dyn LedgerClient,
    book_id: &str,
    gl_account_id: &str,
) -> Result<Vec<LedgerTransaction>> {
    let query = format!("{}:{gl_account_id}", props::GL_ACCOUNT_ID);
    let mut matches = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client
            .search_transactions(book_id, &query, cursor.as_deref())
            .await?;
        for transaction in page.transactions {
            if transaction.properties.get(props::GL_ACCOUNT_ID).map(String::as_str)
                == Some(gl_account_id)
            {
                matches.push(transaction);
            }
        }
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    debug!(gl_account_id, count = matches.len(), "matched lifetime bucket entries");
    Ok(matches)
}
