use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Merchant profile, one per merchant user. The balance is credited on goal
/// redemption and debited when a payout request places a hold on the funds.
/// Bank details are an advisory snapshot for payout processing.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MerchantProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub is_verified: bool,
    pub bank_name: Option<String>,
    pub bank_account_no: Option<String>,
    pub bank_account_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
