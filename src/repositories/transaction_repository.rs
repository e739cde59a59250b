//! Repository for the immutable transaction ledger.
//!
//! Rows are inserted once and only ever move out of PENDING; financial
//! fields are write-once. The `reference` UNIQUE constraint is the storage
//! backstop for the executor's idempotency guard.

use crate::error::RepositoryError;
use crate::models::{LedgerTransaction, TransactionStatus, TransactionType};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Insert payload for a new ledger entry
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub wallet_id: Uuid,
    pub goal_id: Option<Uuid>,
    pub merchant_profile_id: Option<Uuid>,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub reference: String,
    pub balance_before: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    pub metadata: Option<Value>,
}

pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a ledger entry by its unique reference
    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<LedgerTransaction>, RepositoryError> {
        let tx = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            SELECT id, wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                   status, reference, balance_before, balance_after, metadata, created_at
            FROM transactions
            WHERE reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tx)
    }

    /// Get transaction history for a wallet, newest first
    pub async fn list_by_wallet(
        &self,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LedgerTransaction>, RepositoryError> {
        let transactions = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            SELECT id, wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                   status, reference, balance_before, balance_after, metadata, created_at
            FROM transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    // =========================================================================
    // Unit-of-work operations (run on the executor's connection)
    // =========================================================================

    /// Reference lookup inside the current unit (the executor's replay guard)
    pub async fn find_by_reference_in(
        conn: &mut PgConnection,
        reference: &str,
    ) -> Result<Option<LedgerTransaction>, RepositoryError> {
        let tx = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            SELECT id, wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                   status, reference, balance_before, balance_after, metadata, created_at
            FROM transactions
            WHERE reference = $1
            "#,
        )
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(tx)
    }

    /// Read a ledger entry by id with a row lock
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        transaction_id: Uuid,
    ) -> Result<Option<LedgerTransaction>, RepositoryError> {
        let tx = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            SELECT id, wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                   status, reference, balance_before, balance_after, metadata, created_at
            FROM transactions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(tx)
    }

    /// Read a ledger entry by reference with a row lock (gateway fulfillment)
    pub async fn lock_by_reference(
        conn: &mut PgConnection,
        reference: &str,
    ) -> Result<Option<LedgerTransaction>, RepositoryError> {
        let tx = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            SELECT id, wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                   status, reference, balance_before, balance_after, metadata, created_at
            FROM transactions
            WHERE reference = $1
            FOR UPDATE
            "#,
        )
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(tx)
    }

    /// Insert a ledger entry inside the current unit
    pub async fn insert(
        conn: &mut PgConnection,
        new: NewTransaction,
    ) -> Result<LedgerTransaction, RepositoryError> {
        let tx = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            INSERT INTO transactions
                (wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                 status, reference, balance_before, balance_after, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                      status, reference, balance_before, balance_after, metadata, created_at
            "#,
        )
        .bind(new.wallet_id)
        .bind(new.goal_id)
        .bind(new.merchant_profile_id)
        .bind(new.tx_type.as_str())
        .bind(new.amount)
        .bind(new.status.as_str())
        .bind(&new.reference)
        .bind(new.balance_before)
        .bind(new.balance_after)
        .bind(new.metadata)
        .fetch_one(&mut *conn)
        .await?;

        Ok(tx)
    }

    /// Move a PENDING entry to a terminal status, merging processing metadata
    pub async fn finalize(
        conn: &mut PgConnection,
        transaction_id: Uuid,
        status: TransactionStatus,
        metadata_patch: Value,
    ) -> Result<LedgerTransaction, RepositoryError> {
        let tx = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            UPDATE transactions
            SET status = $2, metadata = COALESCE(metadata, '{}'::jsonb) || $3
            WHERE id = $1
            RETURNING id, wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                      status, reference, balance_before, balance_after, metadata, created_at
            "#,
        )
        .bind(transaction_id)
        .bind(status.as_str())
        .bind(metadata_patch)
        .fetch_one(&mut *conn)
        .await?;

        Ok(tx)
    }

    /// Finalize a gateway-backed entry, writing its balance snapshots once
    pub async fn finalize_with_snapshots(
        conn: &mut PgConnection,
        transaction_id: Uuid,
        status: TransactionStatus,
        balance_before: Decimal,
        balance_after: Decimal,
        metadata_patch: Value,
    ) -> Result<LedgerTransaction, RepositoryError> {
        let tx = sqlx::query_as::<_, LedgerTransaction>(
            r#"
            UPDATE transactions
            SET status = $2, balance_before = $3, balance_after = $4,
                metadata = COALESCE(metadata, '{}'::jsonb) || $5
            WHERE id = $1
            RETURNING id, wallet_id, goal_id, merchant_profile_id, transaction_type, amount,
                      status, reference, balance_before, balance_after, metadata, created_at
            "#,
        )
        .bind(transaction_id)
        .bind(status.as_str())
        .bind(balance_before)
        .bind(balance_after)
        .bind(metadata_patch)
        .fetch_one(&mut *conn)
        .await?;

        Ok(tx)
    }
}
