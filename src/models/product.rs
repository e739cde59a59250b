use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Merchant-priced catalog item. Read-only for the ledger core: goal creation
/// resolves its target amount from the current price, and redemption resolves
/// the merchant to credit through the goal's product.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub merchant_profile_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub created_at: NaiveDateTime,
}
