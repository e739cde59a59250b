//! Atomic unit-of-work execution against the ledger store.
//!
//! `LedgerExecutor` is the single entry point for a unit of work: services
//! compose mutations against the `PgConnection` it provides and never open
//! transactions of their own. Either every mutation in a unit persists or
//! none do; row-level locks (`SELECT ... FOR UPDATE`) serialize concurrent
//! units touching the same balance row. Units that lock multiple rows do so
//! in a fixed order (goal, then wallet or merchant) so they cannot deadlock
//! each other.

use crate::error::{AppError, AppResult};
use crate::models::LedgerTransaction;
use crate::repositories::TransactionRepository;
use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use tracing::warn;

/// Bounded retries for transient storage conflicts (serialization failure,
/// deadlock) before the error surfaces to the caller.
const MAX_ATTEMPTS: u32 = 3;

/// Outcome of an idempotent unit of work.
#[derive(Debug)]
pub enum UnitOutcome<T> {
    /// The mutations ran and committed in this invocation
    Applied(T),
    /// A transaction with this reference already exists; no balance was
    /// touched and the existing row is returned
    Replayed(LedgerTransaction),
}

impl<T> UnitOutcome<T> {
    pub fn is_replay(&self) -> bool {
        matches!(self, UnitOutcome::Replayed(_))
    }
}

/// Executes multi-entity mutations as single atomic units.
pub struct LedgerExecutor {
    pool: PgPool,
}

impl LedgerExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run a unit of work inside one database transaction.
    ///
    /// The closure receives the unit's connection and must perform every
    /// read and write through it. On success the unit commits; on error it
    /// rolls back and nothing is visible. Transient storage conflicts
    /// re-run the whole unit up to [`MAX_ATTEMPTS`] times.
    pub async fn execute<T, F>(&self, unit: F) -> AppResult<T>
    where
        T: Send,
        F: for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, AppResult<T>> + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut tx = self.pool.begin().await.map_err(AppError::from)?;
            let result = unit(&mut *tx).await;
            match result {
                Ok(value) => match tx.commit().await {
                    Ok(()) => return Ok(value),
                    Err(e) => {
                        let err = AppError::from(e);
                        if err.is_retryable() && attempt < MAX_ATTEMPTS {
                            warn!(attempt, error = %err, "ledger unit commit conflict, retrying");
                            continue;
                        }
                        return Err(err);
                    }
                },
                Err(err) => {
                    // Explicit rollback; dropping the transaction would do the
                    // same, but the error path should not depend on drop order.
                    let _ = tx.rollback().await;
                    if err.is_retryable() && attempt < MAX_ATTEMPTS {
                        warn!(attempt, error = %err, "ledger unit conflict, retrying");
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Run a unit of work guarded by a unique transaction reference.
    ///
    /// Inside the same atomic unit, an existing transaction row with this
    /// reference short-circuits the mutations and returns
    /// [`UnitOutcome::Replayed`] — the replay-safety guarantee for retrying
    /// callers (scheduler, gateway webhook). A racing duplicate that trips
    /// the UNIQUE constraint instead resolves to the surviving row.
    pub async fn execute_idempotent<T, F>(
        &self,
        reference: &str,
        unit: F,
    ) -> AppResult<UnitOutcome<T>>
    where
        T: Send + 'static,
        F: for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, AppResult<T>>
            + Send
            + Sync
            + 'static,
    {
        let unit = Arc::new(unit);
        let guard_reference = reference.to_string();

        let outcome = self
            .execute(move |conn: &mut PgConnection| {
                let unit = Arc::clone(&unit);
                let reference = guard_reference.clone();
                Box::pin(async move {
                    if let Some(existing) =
                        TransactionRepository::find_by_reference_in(&mut *conn, &reference).await?
                    {
                        return Ok(UnitOutcome::Replayed(existing));
                    }
                    let value = (*unit)(&mut *conn).await?;
                    Ok(UnitOutcome::Applied(value))
                })
            })
            .await;

        match outcome {
            Err(AppError::AlreadyProcessed(_)) => {
                // Lost the race to a concurrent unit inserting the same
                // reference; the committed row is authoritative.
                let existing = TransactionRepository::new(self.pool.clone())
                    .find_by_reference(reference)
                    .await?
                    .ok_or_else(|| AppError::AlreadyProcessed(reference.to_string()))?;
                Ok(UnitOutcome::Replayed(existing))
            }
            other => other,
        }
    }
}
