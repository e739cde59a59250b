//! Repository for merchant profile data access

use crate::error::RepositoryError;
use crate::models::MerchantProfile;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct MerchantRepository {
    pool: PgPool,
}

impl MerchantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a merchant profile with a zero balance
    pub async fn create(
        &self,
        user_id: Uuid,
        bank_name: Option<&str>,
        bank_account_no: Option<&str>,
        bank_account_name: Option<&str>,
    ) -> Result<MerchantProfile, RepositoryError> {
        let merchant = sqlx::query_as::<_, MerchantProfile>(
            r#"
            INSERT INTO merchant_profiles (user_id, bank_name, bank_account_no, bank_account_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, balance, is_verified, bank_name, bank_account_no,
                      bank_account_name, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(bank_name)
        .bind(bank_account_no)
        .bind(bank_account_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(merchant)
    }

    /// Find a merchant profile by its owner
    pub async fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<MerchantProfile>, RepositoryError> {
        let merchant = sqlx::query_as::<_, MerchantProfile>(
            r#"
            SELECT id, user_id, balance, is_verified, bank_name, bank_account_no,
                   bank_account_name, created_at, updated_at
            FROM merchant_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(merchant)
    }

    /// Find a merchant profile by id
    pub async fn find_by_id(
        &self,
        merchant_id: Uuid,
    ) -> Result<Option<MerchantProfile>, RepositoryError> {
        let merchant = sqlx::query_as::<_, MerchantProfile>(
            r#"
            SELECT id, user_id, balance, is_verified, bank_name, bank_account_no,
                   bank_account_name, created_at, updated_at
            FROM merchant_profiles
            WHERE id = $1
            "#,
        )
        .bind(merchant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(merchant)
    }

    // =========================================================================
    // Unit-of-work operations (run on the executor's connection)
    // =========================================================================

    /// Read a merchant profile by owner with a row lock
    pub async fn lock_by_user(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> Result<Option<MerchantProfile>, RepositoryError> {
        let merchant = sqlx::query_as::<_, MerchantProfile>(
            r#"
            SELECT id, user_id, balance, is_verified, bank_name, bank_account_no,
                   bank_account_name, created_at, updated_at
            FROM merchant_profiles
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(merchant)
    }

    /// Read a merchant profile by id with a row lock
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        merchant_id: Uuid,
    ) -> Result<Option<MerchantProfile>, RepositoryError> {
        let merchant = sqlx::query_as::<_, MerchantProfile>(
            r#"
            SELECT id, user_id, balance, is_verified, bank_name, bank_account_no,
                   bank_account_name, created_at, updated_at
            FROM merchant_profiles
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(merchant_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(merchant)
    }

    /// Write a merchant's new balance inside the current unit
    pub async fn apply_balance(
        conn: &mut PgConnection,
        merchant_id: Uuid,
        balance: Decimal,
    ) -> Result<MerchantProfile, RepositoryError> {
        let merchant = sqlx::query_as::<_, MerchantProfile>(
            r#"
            UPDATE merchant_profiles
            SET balance = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, user_id, balance, is_verified, bank_name, bank_account_no,
                      bank_account_name, created_at, updated_at
            "#,
        )
        .bind(merchant_id)
        .bind(balance)
        .fetch_one(&mut *conn)
        .await?;

        Ok(merchant)
    }
}
