//! Repository for wallet data access

use crate::error::RepositoryError;
use crate::models::Wallet;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's wallet, creating it with a zero balance if absent
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<Wallet, RepositoryError> {
        if let Some(wallet) = self.find_by_user(user_id).await? {
            return Ok(wallet);
        }

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (user_id, balance, currency)
            VALUES ($1, 0, 'GHS')
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id, user_id, balance, currency, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(wallet)
    }

    /// Find a wallet by its owner
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, currency, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    // =========================================================================
    // Unit-of-work operations (run on the executor's connection)
    // =========================================================================

    /// Read a wallet by owner inside the current unit, without locking.
    /// For units that reference the wallet but do not touch its balance.
    pub async fn find_by_user_in(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, currency, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(wallet)
    }

    /// Read a wallet by owner with a row lock, serializing concurrent units
    pub async fn lock_by_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Option<Wallet>, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, currency, created_at, updated_at
            FROM wallets
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(wallet)
    }

    /// Read a wallet by id with a row lock
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        wallet_id: Uuid,
    ) -> Result<Option<Wallet>, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            SELECT id, user_id, balance, currency, created_at, updated_at
            FROM wallets
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(wallet_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(wallet)
    }

    /// Write a wallet's new balance inside the current unit
    pub async fn apply_balance(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        balance: Decimal,
    ) -> Result<Wallet, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET balance = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, balance, currency, created_at, updated_at
            "#,
        )
        .bind(wallet_id)
        .bind(balance)
        .fetch_one(&mut *conn)
        .await?;

        Ok(wallet)
    }
}
