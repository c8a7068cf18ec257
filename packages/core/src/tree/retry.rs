//! Transaction scoping with bounded retry
//!
//! Every mutating engine operation runs through [`transact`]. The caller
//! decides the transaction context explicitly with [`TxScope`]:
//!
//! - `TxScope::Owned`: a write transaction is opened for the operation,
//!   committed on success and rolled back on failure. Retryable failures
//!   (`StaleState`, busy/locked storage) restart the whole transaction with
//!   exponential backoff (10ms, 20ms, 40ms, ... with the default policy).
//! - `TxScope::Joined(tx)`: the operation runs inside the caller's
//!   transaction. It never commits, never rolls back and never retries; the
//!   error is returned to the owner of the transaction.

use std::future::Future;

use tokio::time::Duration;

use crate::config::RetryPolicy;
use crate::db::{SharedTransaction, TreeStore, TxMode};
use crate::tree::TreeError;

/// Transaction context of an engine operation
#[derive(Clone)]
pub enum TxScope {
    /// Open, commit (or roll back) and retry a dedicated transaction
    Owned,

    /// Run inside a transaction owned by the caller
    Joined(SharedTransaction),
}

impl TxScope {
    /// Join an existing transaction
    pub fn joined(tx: &SharedTransaction) -> Self {
        Self::Joined(tx.clone())
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned)
    }
}

impl std::fmt::Debug for TxScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Owned => write!(f, "Owned"),
            Self::Joined(_) => write!(f, "Joined"),
        }
    }
}

/// Backoff before retry number `attempt + 1`
pub(crate) fn backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(policy.base_backoff_ms.saturating_mul(factor))
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` attempts were made
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, TreeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TreeError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!("{} succeeded after {} retry(ies)", label, attempt);
                }
                return Ok(value);
            }

            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                tracing::warn!(
                    "{} failed on attempt {}/{}: {}. Retrying...",
                    label,
                    attempt + 1,
                    max_attempts,
                    e
                );
                tokio::time::sleep(backoff(policy, attempt)).await;
                attempt += 1;
            }

            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!("{} failed after {} attempt(s): {}", label, max_attempts, e);
                }
                return Err(e);
            }
        }
    }
}

/// Run `operation` in the transaction context given by `scope`
///
/// The closure receives a shared handle so it can be called again for each
/// attempt of an owned transaction.
pub(crate) async fn transact<T, F, Fut>(
    store: &dyn TreeStore,
    scope: &TxScope,
    label: &str,
    operation: F,
) -> Result<T, TreeError>
where
    F: Fn(SharedTransaction) -> Fut,
    Fut: Future<Output = Result<T, TreeError>>,
{
    match scope {
        TxScope::Joined(tx) => operation(tx.clone()).await,
        TxScope::Owned => {
            let operation = &operation;
            with_retry(&store.config().retry, label, move || async move {
                let tx = store.begin(TxMode::Write).await?;
                match operation(tx.clone()).await {
                    Ok(value) => {
                        tx.commit().await?;
                        Ok(value)
                    }
                    Err(e) => {
                        if let Err(rollback_error) = tx.rollback().await {
                            tracing::error!(
                                "Rollback after failed {} also failed: {}",
                                label,
                                rollback_error
                            );
                        }
                        Err(e)
                    }
                }
            })
            .await
        }
    }
}
