//! Repository for the merchant product catalog (read-mostly for the ledger)

use crate::error::RepositoryError;
use crate::models::Product;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a catalog item for a merchant
    pub async fn create(
        &self,
        merchant_profile_id: Uuid,
        name: &str,
        price: Decimal,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (merchant_profile_id, name, price)
            VALUES ($1, $2, $3)
            RETURNING id, merchant_profile_id, name, price, created_at
            "#,
        )
        .bind(merchant_profile_id)
        .bind(name)
        .bind(price)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    /// Find a product by id
    pub async fn find_by_id(&self, product_id: Uuid) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, merchant_profile_id, name, price, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Product lookup inside the current unit (redemption resolves the
    /// merchant through the goal's product)
    pub async fn find_by_id_in(
        conn: &mut PgConnection,
        product_id: Uuid,
    ) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, merchant_profile_id, name, price, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(product)
    }
}
